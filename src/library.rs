//! Runtime loader for the native digiapix shared object.
//!
//! [`ApixLibrary::load`] resolves the `ldx_*` entry points once and keeps
//! the mapping alive for as long as any handle derived from it exists.
//! Loading is an explicit step so callers control when the dynamic linker
//! runs and tests can substitute [`crate::mock::MockApix`] instead.

use std::ffi::CStr;
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use libc::{c_void, EXIT_SUCCESS};
use libloading::Library;
use log::{debug, info, warn};

use crate::backend::{ApixBackend, GpioLine};
use crate::error::LibraryError;
use crate::ffi::{self, ApixSymbols, GpioIrqCallback};

/// SONAMEs probed by [`ApixLibrary::load`], in order.
const LIBRARY_CANDIDATES: &[&str] = &["libdigiapix.so.1", "libdigiapix.so"];

/// A loaded digiapix library.
///
/// Cheap to clone; clones share the same mapping. The mapping is unloaded
/// when the last clone and every handle created from it are gone.
#[derive(Clone)]
pub struct ApixLibrary {
    inner: Arc<LibraryInner>,
}

struct LibraryInner {
    symbols: ApixSymbols,
    // keeps the mapping alive for the function pointers above
    _library: Library,
}

impl ApixLibrary {
    /// Loads the library through the system linker search path.
    pub fn load() -> Result<Self, LibraryError> {
        for candidate in LIBRARY_CANDIDATES {
            match Self::load_from(candidate) {
                Ok(library) => return Ok(library),
                Err(err) => debug!("candidate {candidate} not usable: {err}"),
            }
        }
        Err(LibraryError::NotFound("digiapix".into()))
    }

    /// Loads the library from an explicit path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        // SAFETY: loading runs the library's initializers; libdigiapix only
        // sets up its own state.
        let library = unsafe { Library::new(path) }.map_err(|source| {
            LibraryError::LoadFailed {
                path: path.display().to_string(),
                source,
            }
        })?;
        // SAFETY: the table and the mapping live in the same LibraryInner,
        // so the resolved pointers cannot outlive the mapping.
        let symbols = unsafe { ApixSymbols::resolve(&library) }?;
        info!("loaded digiapix library from {}", path.display());
        Ok(Self {
            inner: Arc::new(LibraryInner {
                symbols,
                _library: library,
            }),
        })
    }

    /// The backend view the domain handles consume.
    pub fn backend(&self) -> Arc<dyn ApixBackend> {
        Arc::new(self.clone())
    }

    fn wrap_line(&self, raw: *mut ffi::RawGpio) -> Option<Box<dyn GpioLine>> {
        NonNull::new(raw).map(|ptr| {
            Box::new(NativeGpioLine {
                ptr,
                lib: Arc::clone(&self.inner),
            }) as Box<dyn GpioLine>
        })
    }
}

impl fmt::Debug for ApixLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApixLibrary").finish()
    }
}

// SAFETY throughout this impl: every call goes through a function pointer
// resolved at load time and kept valid by `inner._library`; out pointers
// reference locals that live across the call; by-value configs retain no
// pointers except the WiFi PSK, which the caller keeps alive for the call.
impl ApixBackend for ApixLibrary {
    fn gpio_request(
        &self,
        kernel_number: u32,
        mode: i32,
        request_mode: i32,
    ) -> Option<Box<dyn GpioLine>> {
        let raw = unsafe {
            (self.inner.symbols.gpio_request)(kernel_number, mode, request_mode)
        };
        self.wrap_line(raw)
    }

    fn gpio_request_by_controller(
        &self,
        controller: &CStr,
        line: u8,
        mode: i32,
    ) -> Option<Box<dyn GpioLine>> {
        let raw = unsafe {
            (self.inner.symbols.gpio_request_by_controller)(
                controller.as_ptr(),
                line,
                mode,
            )
        };
        self.wrap_line(raw)
    }

    fn gpio_request_by_alias(
        &self,
        alias: &CStr,
        mode: i32,
        request_mode: i32,
    ) -> Option<Box<dyn GpioLine>> {
        let raw = unsafe {
            (self.inner.symbols.gpio_request_by_alias)(
                alias.as_ptr(),
                mode,
                request_mode,
            )
        };
        self.wrap_line(raw)
    }

    fn net_list_ifaces(&self) -> Vec<String> {
        let mut list = ffi::NetNamesList::default();
        let rc =
            unsafe { (self.inner.symbols.net_list_available_ifaces)(&mut list) };
        if rc < 0 {
            warn!("listing network interfaces reported {rc}");
        }
        decode_names(&list)
    }

    fn net_iface_state(&self, name: &CStr) -> Result<ffi::NetState, i32> {
        let mut state = ffi::NetState::default();
        let rc = unsafe {
            (self.inner.symbols.net_get_iface_state)(name.as_ptr(), &mut state)
        };
        if rc == EXIT_SUCCESS {
            Ok(state)
        } else {
            Err(rc)
        }
    }

    fn net_iface_stats(&self, name: &CStr) -> Result<ffi::NetStats, i32> {
        let mut stats = ffi::NetStats::default();
        let rc = unsafe {
            (self.inner.symbols.net_get_iface_stats)(name.as_ptr(), &mut stats)
        };
        if rc == EXIT_SUCCESS {
            Ok(stats)
        } else {
            Err(rc)
        }
    }

    fn net_set_config(&self, config: ffi::NetConfig) -> i32 {
        unsafe { (self.inner.symbols.net_set_config)(config) }
    }

    fn wifi_list_ifaces(&self) -> Vec<String> {
        let mut list = ffi::NetNamesList::default();
        let rc = unsafe {
            (self.inner.symbols.wifi_list_available_ifaces)(&mut list)
        };
        if rc < 0 {
            warn!("listing WiFi interfaces reported {rc}");
        }
        decode_names(&list)
    }

    fn wifi_iface_state(&self, name: &CStr) -> Result<ffi::WifiState, i32> {
        let mut state = ffi::WifiState::default();
        let rc = unsafe {
            (self.inner.symbols.wifi_get_iface_state)(name.as_ptr(), &mut state)
        };
        if rc == EXIT_SUCCESS {
            Ok(state)
        } else {
            Err(rc)
        }
    }

    fn wifi_set_config(&self, config: ffi::WifiConfig) -> i32 {
        unsafe { (self.inner.symbols.wifi_set_config)(config) }
    }

    fn bt_list_devices(&self) -> Vec<u16> {
        let mut ids: *mut u16 = std::ptr::null_mut();
        let count =
            unsafe { (self.inner.symbols.bt_list_available_devices)(&mut ids) };
        if count <= 0 || ids.is_null() {
            return Vec::new();
        }
        // the id buffer stays owned by the native layer; copy, never free
        unsafe { slice::from_raw_parts(ids, count as usize) }.to_vec()
    }

    fn bt_device_state(&self, dev_id: u16) -> Result<ffi::BtState, i32> {
        let mut state = ffi::BtState::default();
        let rc =
            unsafe { (self.inner.symbols.bt_get_state)(dev_id, &mut state) };
        if rc == EXIT_SUCCESS {
            Ok(state)
        } else {
            Err(rc)
        }
    }

    fn bt_device_stats(&self, dev_id: u16) -> Result<ffi::BtStats, i32> {
        let mut stats = ffi::BtStats::default();
        let rc =
            unsafe { (self.inner.symbols.bt_get_stats)(dev_id, &mut stats) };
        if rc == EXIT_SUCCESS {
            Ok(stats)
        } else {
            Err(rc)
        }
    }

    fn bt_set_config(&self, config: ffi::BtConfig) -> i32 {
        unsafe { (self.inner.symbols.bt_set_config)(config) }
    }
}

/// A line requested through the native library. Exclusive owner of the
/// `gpio_t` pointer from request to free.
struct NativeGpioLine {
    ptr: NonNull<ffi::RawGpio>,
    lib: Arc<LibraryInner>,
}

// SAFETY: the native layer binds no thread affinity to a line, and this
// wrapper is the pointer's sole owner until drop.
unsafe impl Send for NativeGpioLine {}
unsafe impl Sync for NativeGpioLine {}

// SAFETY throughout this impl: `ptr` is live from request until the free in
// drop, and the symbols outlive it via `lib`. The alias and controller
// strings are NUL terminated and owned by the native layer.
impl GpioLine for NativeGpioLine {
    fn alias(&self) -> Option<String> {
        unsafe {
            let alias = self.ptr.as_ref().alias;
            if alias.is_null() {
                None
            } else {
                Some(CStr::from_ptr(alias).to_string_lossy().into_owned())
            }
        }
    }

    fn kernel_number(&self) -> u32 {
        unsafe { self.ptr.as_ref().kernel_number }
    }

    fn controller(&self) -> Option<String> {
        unsafe {
            let controller = self.ptr.as_ref().gpio_controller;
            if controller.is_null() {
                None
            } else {
                Some(CStr::from_ptr(controller).to_string_lossy().into_owned())
            }
        }
    }

    fn line(&self) -> u32 {
        unsafe { self.ptr.as_ref().gpio_line }
    }

    fn set_mode(&self, mode: i32) -> i32 {
        unsafe { (self.lib.symbols.gpio_set_mode)(self.ptr.as_ptr(), mode) }
    }

    fn mode(&self) -> i32 {
        unsafe { (self.lib.symbols.gpio_get_mode)(self.ptr.as_ptr()) }
    }

    fn set_value(&self, value: i32) -> i32 {
        unsafe { (self.lib.symbols.gpio_set_value)(self.ptr.as_ptr(), value) }
    }

    fn value(&self) -> i32 {
        unsafe { (self.lib.symbols.gpio_get_value)(self.ptr.as_ptr()) }
    }

    fn set_active_mode(&self, mode: i32) -> i32 {
        unsafe {
            (self.lib.symbols.gpio_set_active_mode)(self.ptr.as_ptr(), mode)
        }
    }

    fn active_mode(&self) -> i32 {
        unsafe { (self.lib.symbols.gpio_get_active_mode)(self.ptr.as_ptr()) }
    }

    fn set_debounce(&self, usec: u32) -> i32 {
        unsafe {
            (self.lib.symbols.gpio_set_debounce)(self.ptr.as_ptr(), usec)
        }
    }

    fn wait_interrupt(&self, timeout_ms: i32) -> i32 {
        unsafe {
            (self.lib.symbols.gpio_wait_interrupt)(self.ptr.as_ptr(), timeout_ms)
        }
    }

    fn start_wait_interrupt(
        &self,
        callback: GpioIrqCallback,
        arg: *mut c_void,
    ) -> i32 {
        unsafe {
            (self.lib.symbols.gpio_start_wait_interrupt)(
                self.ptr.as_ptr(),
                callback,
                arg,
            )
        }
    }

    fn stop_wait_interrupt(&self) -> i32 {
        unsafe {
            (self.lib.symbols.gpio_stop_wait_interrupt)(self.ptr.as_ptr())
        }
    }
}

impl Drop for NativeGpioLine {
    fn drop(&mut self) {
        // identity must be read before the native free invalidates the
        // pointer
        let kernel_number = self.kernel_number();
        let rc =
            unsafe { (self.lib.symbols.gpio_free)(self.ptr.as_ptr()) };
        if rc != EXIT_SUCCESS {
            warn!("freeing GPIO {kernel_number} reported {rc}");
        }
    }
}

fn decode_names(list: &ffi::NetNamesList) -> Vec<String> {
    let count = list.n_ifaces.clamp(0, ffi::MAX_NET_IFACES as i32) as usize;
    list.names[..count]
        .iter()
        .map(|name| ffi::c_chars_to_string(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::copy_str_to_c_chars;

    #[test]
    fn name_list_decoding_honors_the_reported_count() {
        let mut list = ffi::NetNamesList::default();
        copy_str_to_c_chars(&mut list.names[0], "eth0");
        copy_str_to_c_chars(&mut list.names[1], "wlan0");
        copy_str_to_c_chars(&mut list.names[2], "stale");
        list.n_ifaces = 2;

        assert_eq!(decode_names(&list), vec!["eth0", "wlan0"]);
    }

    #[test]
    fn name_list_decoding_clamps_bogus_counts() {
        let mut list = ffi::NetNamesList::default();
        list.n_ifaces = -3;
        assert!(decode_names(&list).is_empty());

        list.n_ifaces = i32::MAX;
        assert_eq!(decode_names(&list).len(), ffi::MAX_NET_IFACES);
    }

    #[test]
    fn loading_a_missing_path_reports_the_path() {
        let err = ApixLibrary::load_from("/nonexistent/libdigiapix.so")
            .unwrap_err();
        match err {
            LibraryError::LoadFailed { path, .. } => {
                assert_eq!(path, "/nonexistent/libdigiapix.so");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
