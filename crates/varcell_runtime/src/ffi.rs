//! C ABI used by generated native code
//!
//! The object runtime registers its incref/decref primitives once with
//! [`varcell_runtime_install`]; afterwards compiled functions manage captured
//! variables through opaque shared cell handles.

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_void};
use std::os::raw::c_char;
use std::ptr;

use once_cell::sync::OnceCell;

use crate::cells::SharedCell;
use crate::error::{CellError, invariant_violation};
use crate::object::{Claim, ObjectRuntime};

/// Object runtime primitive: takes or gives up one claim on an object.
pub type ClaimFn = extern "C" fn(*mut c_void);

#[derive(Clone, Copy)]
struct Hooks {
    acquire: ClaimFn,
    release: ClaimFn,
}

static HOOKS: OnceCell<Hooks> = OnceCell::new();

/// Pointer to an object of the native object runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectPtr(pub *mut c_void);

// SAFETY: with atomic reference counts, cells holding object pointers move
// between threads. The object runtime installed through
// `varcell_runtime_install` must then make its claim hooks thread-safe.
#[cfg(feature = "atomic-refcount")]
unsafe impl Send for ObjectPtr {}

// SAFETY: see the `Send` impl above.
#[cfg(feature = "atomic-refcount")]
unsafe impl Sync for ObjectPtr {}

impl ObjectPtr {
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// The object runtime reached through the installed C hooks
pub struct NativeRuntime;

impl NativeRuntime {
    fn hooks() -> Hooks {
        match HOOKS.get() {
            Some(hooks) => *hooks,
            None => invariant_violation("object runtime hooks used before varcell_runtime_install"),
        }
    }
}

impl ObjectRuntime for NativeRuntime {
    type Object = ObjectPtr;

    fn acquire_claim(object: ObjectPtr) -> ObjectPtr {
        (Self::hooks().acquire)(object.0);
        object
    }

    fn release_claim(object: ObjectPtr) {
        (Self::hooks().release)(object.0);
    }
}

/// Opaque handle on a shared cell, owned by generated code
pub type SharedHandle = *mut SharedCell<NativeRuntime>;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn make_c_string(value: &str) -> CString {
    CString::new(value.replace('\0', "?")).unwrap_or_default()
}

fn set_last_error(err: &CellError) {
    tracing::warn!(error = %err, "variable cell access failed");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(make_c_string(&err.to_string())));
}

fn handle_ref<'a>(handle: SharedHandle) -> &'a SharedCell<NativeRuntime> {
    if handle.is_null() {
        invariant_violation("null shared cell handle");
    }
    // SAFETY: non-null handles come from `into_handle` and stay valid until
    // their matching `varcell_shared_release`, which the caller guarantees.
    unsafe { &*handle }
}

fn into_handle(cell: SharedCell<NativeRuntime>) -> SharedHandle {
    Box::into_raw(Box::new(cell))
}

/// Register the object runtime's claim primitives. Returns `true` if these
/// hooks are the ones in effect (installing the same hooks twice is fine).
#[unsafe(no_mangle)]
pub extern "C" fn varcell_runtime_install(acquire: ClaimFn, release: ClaimFn) -> bool {
    let installed = HOOKS.get_or_init(|| {
        if let Err(err) = crate::init_from_env() {
            invariant_violation(&format!("{err:#}"));
        }
        Hooks { acquire, release }
    });
    ptr::fn_addr_eq(installed.acquire, acquire) && ptr::fn_addr_eq(installed.release, release)
}

/// Create a shared cell. A non-null `object` is an owned claim that moves into
/// the cell; null creates it unbound.
///
/// # Safety
/// `name` must be null or point to a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn varcell_shared_create(
    name: *const c_char,
    object: *mut c_void,
) -> SharedHandle {
    let name = if name.is_null() {
        String::from("<unnamed>")
    } else {
        unsafe { CStr::from_ptr(name) }
            .to_string_lossy()
            .into_owned()
    };
    let initial = (!object.is_null()).then(|| Claim::from_owned(ObjectPtr(object)));
    into_handle(SharedCell::create(name, initial))
}

/// Take another reference on a shared cell for a capturing closure.
///
/// # Safety
/// `handle` must be a live handle returned by this module.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn varcell_shared_retain(handle: SharedHandle) -> SharedHandle {
    into_handle(handle_ref(handle).retain())
}

/// Release one reference. The handle is invalid afterwards.
///
/// # Safety
/// `handle` must be a live handle returned by this module and must not be
/// used after this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn varcell_shared_release(handle: SharedHandle) {
    if handle.is_null() {
        invariant_violation("release of null shared cell handle");
    }
    let cell = unsafe { *Box::from_raw(handle) };
    cell.release();
}

/// Bind the variable; ownership of one claim on `object` moves into the cell.
///
/// # Safety
/// `handle` must be live and `object` a valid, owned object reference.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn varcell_shared_assign(handle: SharedHandle, object: *mut c_void) {
    if object.is_null() {
        invariant_violation("assignment of null object");
    }
    handle_ref(handle).assign(Claim::from_owned(ObjectPtr(object)));
}

/// Borrow the bound object, or null (recording the error) when unbound.
///
/// # Safety
/// `handle` must be live. The result is borrowed and only valid until the
/// variable is next rebound or deleted.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn varcell_shared_read(handle: SharedHandle) -> *mut c_void {
    match handle_ref(handle).read() {
        Ok(object) => object.0,
        Err(err) => {
            set_last_error(&err);
            ptr::null_mut()
        }
    }
}

/// Delete the variable. Returns `false` (recording the error) when unbound.
///
/// # Safety
/// `handle` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn varcell_shared_clear(handle: SharedHandle) -> bool {
    match handle_ref(handle).clear() {
        Ok(()) => true,
        Err(err) => {
            set_last_error(&err);
            false
        }
    }
}

/// # Safety
/// `handle` must be live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn varcell_shared_is_initialized(handle: SharedHandle) -> bool {
    handle_ref(handle).is_initialized()
}

/// Message of the last unbound error on this thread, or null. Valid until the
/// next failing call or [`varcell_clear_last_error`].
#[unsafe(no_mangle)]
pub extern "C" fn varcell_last_error_message() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |message| message.as_ptr())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn varcell_clear_last_error() {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicIsize, Ordering};

    use super::*;

    /// Stand-in for a native object header with an embedded refcount
    struct NativeObject {
        refcnt: AtomicIsize,
    }

    extern "C" fn incref(object: *mut c_void) {
        let object = unsafe { &*object.cast::<NativeObject>() };
        object.refcnt.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn decref(object: *mut c_void) {
        let object = unsafe { &*object.cast::<NativeObject>() };
        object.refcnt.fetch_sub(1, Ordering::SeqCst);
    }

    fn install() {
        // Every test installs the same hooks; only the first call wins.
        let _ = varcell_runtime_install(incref, decref);
    }

    fn new_object() -> Box<NativeObject> {
        Box::new(NativeObject {
            refcnt: AtomicIsize::new(1),
        })
    }

    fn as_ptr(object: &NativeObject) -> *mut c_void {
        ptr::from_ref(object).cast_mut().cast()
    }

    #[test]
    fn test_shared_cell_through_c_abi() {
        install();
        let object = new_object();
        let name = CString::new("x").unwrap();

        unsafe {
            let h1 = varcell_shared_create(name.as_ptr(), ptr::null_mut());
            assert!(!varcell_shared_is_initialized(h1));

            let h2 = varcell_shared_retain(h1);
            varcell_shared_assign(h1, as_ptr(&object));
            assert_eq!(varcell_shared_read(h2), as_ptr(&object));
            assert_eq!(object.refcnt.load(Ordering::SeqCst), 1);

            varcell_shared_release(h1);
            assert_eq!(object.refcnt.load(Ordering::SeqCst), 1);
            varcell_shared_release(h2);
        }
        assert_eq!(object.refcnt.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unbound_access_records_error() {
        install();
        varcell_clear_last_error();
        let name = CString::new("y").unwrap();

        unsafe {
            let handle = varcell_shared_create(name.as_ptr(), ptr::null_mut());
            assert!(varcell_shared_read(handle).is_null());
            let message = CStr::from_ptr(varcell_last_error_message());
            assert_eq!(
                message.to_str().unwrap(),
                "local variable 'y' referenced before assignment"
            );

            let captured = varcell_shared_retain(handle);
            assert!(!varcell_shared_clear(captured));
            let message = CStr::from_ptr(varcell_last_error_message());
            assert!(message.to_str().unwrap().starts_with("free variable 'y'"));

            varcell_shared_release(captured);
            varcell_shared_release(handle);
        }

        varcell_clear_last_error();
        assert!(varcell_last_error_message().is_null());
    }

    #[test]
    fn test_create_bound_and_clear() {
        install();
        let object = new_object();

        unsafe {
            let handle = varcell_shared_create(ptr::null(), as_ptr(&object));
            assert!(varcell_shared_is_initialized(handle));
            assert!(varcell_shared_clear(handle));
            assert_eq!(object.refcnt.load(Ordering::SeqCst), 0);
            varcell_shared_release(handle);
        }
        assert_eq!(object.refcnt.load(Ordering::SeqCst), 0);
    }

    #[cfg(feature = "atomic-refcount")]
    #[test]
    fn test_native_cells_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedCell<NativeRuntime>>();
        assert_send_sync::<Claim<NativeRuntime>>();
    }

    #[cfg(feature = "atomic-refcount")]
    #[test]
    fn test_shared_cell_across_threads() {
        install();
        let first = new_object();
        let second = new_object();
        let second_ptr = ObjectPtr(as_ptr(&second));

        let cell = SharedCell::<NativeRuntime>::create(
            "x",
            Some(Claim::from_owned(ObjectPtr(as_ptr(&first)))),
        );
        let handles: Vec<_> = (0..4).map(|_| cell.retain()).collect();
        assert_eq!(cell.refcount(), 5);

        std::thread::scope(|scope| {
            for handle in handles {
                scope.spawn(move || {
                    handle.assign_borrowed(second_ptr);
                    let kept = handle.read_owned().unwrap();
                    assert_eq!(kept.object(), second_ptr);
                    drop(kept);
                    handle.release();
                });
            }
        });

        assert_eq!(cell.refcount(), 1);
        assert_eq!(cell.read().unwrap(), second_ptr);
        assert_eq!(first.refcnt.load(Ordering::SeqCst), 0);
        assert_eq!(second.refcnt.load(Ordering::SeqCst), 2);

        cell.release();
        assert_eq!(second.refcnt.load(Ordering::SeqCst), 1);
    }
}
