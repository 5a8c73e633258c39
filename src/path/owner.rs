//! File ownership and user/group name resolution.

use std::ffi::{CStr, CString};
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::debug;

use crate::error::SyError;
use crate::Result;

const INITIAL_BUFFER: usize = 1024;
const MAX_BUFFER: usize = 1 << 20;

/// Change the owner and group of `path`.
///
/// Each of `owner` and `group` is a name or a numeric id; `None` leaves
/// it unchanged. Names must exist on this system.
///
/// ```no_run
/// sy::path::chown("/srv/app/data", Some("www-data"), None)?;
/// # Ok::<(), sy::SyError>(())
/// ```
pub fn chown(path: impl AsRef<Path>, owner: Option<&str>, group: Option<&str>) -> Result<()> {
    let uid = owner.map(resolve_uid).transpose()?;
    let gid = group.map(resolve_gid).transpose()?;
    debug!(path = %path.as_ref().display(), ?uid, ?gid, "chown");
    std::os::unix::fs::chown(path, uid, gid)?;
    Ok(())
}

/// Name of the user owning `path`, or the numeric uid if it has no entry.
pub fn owner(path: impl AsRef<Path>) -> Result<String> {
    let uid = owner_id(path)?;
    Ok(user_name(uid)?.unwrap_or_else(|| uid.to_string()))
}

/// Name of the group owning `path`, or the numeric gid if it has no entry.
pub fn group(path: impl AsRef<Path>) -> Result<String> {
    let gid = group_id(path)?;
    Ok(group_name(gid)?.unwrap_or_else(|| gid.to_string()))
}

/// Uid owning `path`. Symlinks are not followed.
pub fn owner_id(path: impl AsRef<Path>) -> Result<u32> {
    Ok(std::fs::symlink_metadata(path)?.uid())
}

/// Gid owning `path`. Symlinks are not followed.
pub fn group_id(path: impl AsRef<Path>) -> Result<u32> {
    Ok(std::fs::symlink_metadata(path)?.gid())
}

/// Name of the effective user of this process.
pub fn current_user() -> Result<String> {
    // SAFETY: geteuid(2) cannot fail and has no preconditions.
    let uid = unsafe { libc::geteuid() };
    Ok(user_name(uid)?.unwrap_or_else(|| uid.to_string()))
}

fn resolve_uid(owner: &str) -> Result<u32> {
    if let Ok(uid) = owner.parse() {
        return Ok(uid);
    }
    user_id(owner)?.ok_or_else(|| SyError::UnknownUser(owner.to_string()))
}

fn resolve_gid(group: &str) -> Result<u32> {
    if let Ok(gid) = group.parse() {
        return Ok(gid);
    }
    group_id_by_name(group)?.ok_or_else(|| SyError::UnknownGroup(group.to_string()))
}

fn user_id(name: &str) -> io::Result<Option<u32>> {
    let Ok(cname) = CString::new(name) else {
        return Ok(None);
    };
    lookup::<libc::passwd, _>(
        // SAFETY: every pointer refers to storage owned by `lookup` that
        // outlives the call; `buflen` is the length of `buf`.
        |entry, buf, buflen, result| unsafe {
            libc::getpwnam_r(cname.as_ptr(), entry, buf, buflen, result)
        },
        |entry| entry.pw_uid,
    )
}

fn group_id_by_name(name: &str) -> io::Result<Option<u32>> {
    let Ok(cname) = CString::new(name) else {
        return Ok(None);
    };
    lookup::<libc::group, _>(
        // SAFETY: as for `user_id`.
        |entry, buf, buflen, result| unsafe {
            libc::getgrnam_r(cname.as_ptr(), entry, buf, buflen, result)
        },
        |entry| entry.gr_gid,
    )
}

fn user_name(uid: u32) -> io::Result<Option<String>> {
    lookup::<libc::passwd, _>(
        // SAFETY: as for `user_id`.
        |entry, buf, buflen, result| unsafe { libc::getpwuid_r(uid, entry, buf, buflen, result) },
        // SAFETY: on success pw_name points to a NUL-terminated string
        // inside the buffer, which is still alive here.
        |entry| unsafe { CStr::from_ptr(entry.pw_name) }.to_string_lossy().into_owned(),
    )
}

fn group_name(gid: u32) -> io::Result<Option<String>> {
    lookup::<libc::group, _>(
        // SAFETY: as for `user_id`.
        |entry, buf, buflen, result| unsafe { libc::getgrgid_r(gid, entry, buf, buflen, result) },
        // SAFETY: as for `user_name`.
        |entry| unsafe { CStr::from_ptr(entry.gr_name) }.to_string_lossy().into_owned(),
    )
}

/// Drive one of the reentrant `get{pw,gr}*_r` calls, growing the string
/// buffer on ERANGE. `Ok(None)` means no such entry.
fn lookup<E, T>(
    mut call: impl FnMut(*mut E, *mut libc::c_char, libc::size_t, *mut *mut E) -> libc::c_int,
    extract: impl FnOnce(&E) -> T,
) -> io::Result<Option<T>> {
    let mut buf: Vec<libc::c_char> = vec![0; INITIAL_BUFFER];
    loop {
        let mut entry = MaybeUninit::<E>::uninit();
        let mut result: *mut E = std::ptr::null_mut();
        let rc = call(entry.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut result);

        if rc == libc::ERANGE && buf.len() < MAX_BUFFER {
            let len = buf.len() * 2;
            buf.resize(len, 0);
            continue;
        }
        // Some libcs report a missing entry as an error code.
        if rc == libc::ENOENT || rc == libc::ESRCH {
            return Ok(None);
        }
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        if result.is_null() {
            return Ok(None);
        }
        // SAFETY: a non-null result means the call filled in `entry`.
        let entry = unsafe { entry.assume_init_ref() };
        return Ok(Some(extract(entry)));
    }
}
