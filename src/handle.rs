//! Scoped ownership of SCM handles

use std::marker::PhantomData;

use log::debug;

use crate::error::{Result, ServiceError};
use crate::scm::{RawHandle, ScmApi};

/// An open manager or service handle, closed exactly once when dropped.
///
/// The guard is `!Send`: each thread opens its own handles.
pub struct ScHandle<'a, A: ScmApi + ?Sized> {
    api: &'a A,
    raw: RawHandle,
    _not_send: PhantomData<*const ()>,
}

impl<'a, A: ScmApi + ?Sized> ScHandle<'a, A> {
    /// Open the service control manager with `access` rights.
    pub fn manager(api: &'a A, access: u32) -> Result<Self> {
        let raw = api
            .open_manager(access)
            .map_err(|e| ServiceError::os("OpenSCManager", e))?;
        Ok(Self::wrap(api, raw))
    }

    /// Open the service `name` through this manager with `access` rights.
    pub fn service(&self, name: &str, access: u32) -> Result<ScHandle<'a, A>> {
        let raw = self
            .api
            .open_service(self.raw, name, access)
            .map_err(|e| ServiceError::os("OpenService", e))?;
        Ok(Self::wrap(self.api, raw))
    }

    /// Take ownership of a handle the OS has just returned.
    pub fn wrap(api: &'a A, raw: RawHandle) -> Self {
        Self {
            api,
            raw,
            _not_send: PhantomData,
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl<A: ScmApi + ?Sized> Drop for ScHandle<'_, A> {
    fn drop(&mut self) {
        debug!("Closing SCM handle {:?}", self.raw);
        self.api.close_handle(self.raw);
    }
}
