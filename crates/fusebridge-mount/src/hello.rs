//! Demo handler set.
//!
//! Two directories, `/` and `/moto`, each holding a read-only `hello` file.

use fusebridge_kernel::{FileAttributes, FileHandleInfo, FsHandler, ListingSlot, Operation, Status};

pub const HELLO_CONTENTS: &[u8] = b"Hello World!\n";

const DIR_MODE: u32 = libc::S_IFDIR as u32 | 0o755;
const FILE_MODE: u32 = libc::S_IFREG as u32 | 0o444;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Dir,
    File,
}

fn node(path: &str) -> Option<Node> {
    match path {
        "/" | "/moto" => Some(Node::Dir),
        "/hello" | "/moto/hello" => Some(Node::File),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HelloFs {
    uid: u32,
    gid: u32,
}

impl Default for HelloFs {
    fn default() -> Self {
        Self::new()
    }
}

impl HelloFs {
    /// Files owned by the serving process.
    pub fn new() -> Self {
        Self::with_owner(
            rustix::process::getuid().as_raw(),
            rustix::process::getgid().as_raw(),
        )
    }

    pub fn with_owner(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

impl FsHandler for HelloFs {
    fn supports(&self, op: Operation) -> bool {
        !matches!(op, Operation::Write)
    }

    fn open(&self, path: &str, info: &mut FileHandleInfo) -> Status {
        if node(path) != Some(Node::File) {
            return Status::NOT_FOUND;
        }
        if (info.flags & libc::O_ACCMODE as u32) != libc::O_RDONLY as u32 {
            return Status::PERMISSION_DENIED;
        }
        Status::OK
    }

    fn read(&self, path: &str, buf: &mut [u8], offset: u64, _info: &mut FileHandleInfo) -> Status {
        if node(path) != Some(Node::File) {
            return Status::NOT_FOUND;
        }
        let Ok(start) = usize::try_from(offset) else {
            return Status::bytes(0);
        };
        let Some(rest) = HELLO_CONTENTS.get(start..) else {
            return Status::bytes(0);
        };
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        Status::bytes(n)
    }

    fn getattr(&self, path: &str, attrs: &mut FileAttributes) -> Status {
        let Some(node) = node(path) else {
            return Status::NOT_FOUND;
        };
        attrs.uid = self.uid;
        attrs.gid = self.gid;
        match node {
            Node::Dir => {
                attrs.mode = DIR_MODE;
                attrs.size = 0;
            }
            Node::File => {
                attrs.mode = FILE_MODE;
                attrs.size = HELLO_CONTENTS.len() as u64;
            }
        }
        Status::OK
    }

    fn readdir(&self, path: &str, slot: &mut ListingSlot<'_>) -> Status {
        match path {
            "/" => slot.fill([".", "..", "hello", "moto"]),
            "/moto" => slot.fill([".", "..", "hello"]),
            _ => {}
        }
        Status::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusebridge_kernel::{Bridge, HandlerTable};
    use std::sync::Arc;

    fn hello() -> HelloFs {
        HelloFs::with_owner(1000, 100)
    }

    fn open_with(flags: i32) -> Status {
        let mut info = FileHandleInfo {
            flags: flags as u32,
            ..Default::default()
        };
        hello().open("/hello", &mut info)
    }

    #[test]
    fn test_supports_everything_but_write() {
        let fs = hello();
        assert!(fs.supports(Operation::Open));
        assert!(fs.supports(Operation::ReadDir));
        assert!(!fs.supports(Operation::Write));
    }

    #[test]
    fn test_open_read_only() {
        assert_eq!(open_with(libc::O_RDONLY), Status::OK);
        assert_eq!(open_with(libc::O_WRONLY), Status::PERMISSION_DENIED);
        assert_eq!(open_with(libc::O_RDWR), Status::PERMISSION_DENIED);
    }

    #[test]
    fn test_open_unknown_and_directory() {
        let mut info = FileHandleInfo::default();
        assert_eq!(hello().open("/nope", &mut info), Status::NOT_FOUND);
        assert_eq!(hello().open("/moto", &mut info), Status::NOT_FOUND);
    }

    #[test]
    fn test_read_at_offsets() {
        let mut info = FileHandleInfo::default();
        let mut buf = [0u8; 5];
        assert_eq!(hello().read("/moto/hello", &mut buf, 6, &mut info), Status::bytes(5));
        assert_eq!(&buf, b"World");
        assert_eq!(hello().read("/hello", &mut buf, 100, &mut info), Status::bytes(0));
    }

    #[test]
    fn test_getattr() {
        let mut attrs = FileAttributes::default();
        assert_eq!(hello().getattr("/moto", &mut attrs), Status::OK);
        assert!(attrs.is_dir());
        assert_eq!(attrs.perm(), 0o755);
        assert_eq!((attrs.uid, attrs.gid), (1000, 100));

        let mut attrs = FileAttributes::default();
        assert_eq!(hello().getattr("/hello", &mut attrs), Status::OK);
        assert!(attrs.is_file());
        assert_eq!(attrs.perm(), 0o444);
        assert_eq!(attrs.size, 13);

        assert_eq!(hello().getattr("/missing", &mut attrs), Status::NOT_FOUND);
    }

    #[test]
    fn test_readdir_listings() {
        let bridge = Bridge::new(HandlerTable::from_handler(Arc::new(hello())));
        let list = |path: &str| {
            let mut names = Vec::new();
            let mut filler = |name: &[u8]| {
                names.push(String::from_utf8_lossy(name).into_owned());
                true
            };
            let status = bridge.readdir(path, &mut filler, 0, None);
            (status, names)
        };

        let (status, names) = list("/");
        assert_eq!(status, Status::OK);
        assert_eq!(names, [".", "..", "hello", "moto"]);

        let (status, names) = list("/moto");
        assert_eq!(status, Status::OK);
        assert_eq!(names, [".", "..", "hello"]);

        let (status, names) = list("/hello");
        assert_eq!(status, Status::NOT_FOUND);
        assert!(names.is_empty());
    }
}
