//! Remote storage adapter seam.

use std::path::Path;
use std::sync::Arc;

/// Pushes and removes resources on a remote server.
///
/// Both calls report success as a bool. Failures are logged by the caller;
/// they are not retried.
pub trait RemoteSync: Send {
    fn sync_resource(&self, basename: &str, url: &str, server: &str, local_file: &Path) -> bool;

    fn destroy_resource(&self, basename: &str, server: &str) -> bool;
}

impl<R: RemoteSync + ?Sized> RemoteSync for Box<R> {
    fn sync_resource(&self, basename: &str, url: &str, server: &str, local_file: &Path) -> bool {
        (**self).sync_resource(basename, url, server, local_file)
    }

    fn destroy_resource(&self, basename: &str, server: &str) -> bool {
        (**self).destroy_resource(basename, server)
    }
}

impl<R: RemoteSync + Sync + ?Sized> RemoteSync for Arc<R> {
    fn sync_resource(&self, basename: &str, url: &str, server: &str, local_file: &Path) -> bool {
        (**self).sync_resource(basename, url, server, local_file)
    }

    fn destroy_resource(&self, basename: &str, server: &str) -> bool {
        (**self).destroy_resource(basename, server)
    }
}

/// Adapter that only logs what it would do.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRemote;

impl RemoteSync for DryRunRemote {
    fn sync_resource(&self, basename: &str, url: &str, server: &str, local_file: &Path) -> bool {
        crate::log_event!(
            "remote",
            "dry-run sync",
            "'{}' as '{basename}' to {server} ({url})",
            local_file.display()
        );
        true
    }

    fn destroy_resource(&self, basename: &str, server: &str) -> bool {
        crate::log_event!("remote", "dry-run destroy", "'{basename}' on {server}");
        true
    }
}
