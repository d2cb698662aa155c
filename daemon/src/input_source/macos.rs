//! Text Input Source Services bindings
//!
//! Queries and selects keyboard input sources through HIToolbox, and
//! observes the distributed notifications posted when the selected source or
//! the enabled source list changes.

use std::ffi::c_void;

use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::string::{CFString, CFStringRef};
use core_foundation::url::{CFURLRef, CFURL};
use tracing::{debug, warn};

use super::provider::{InputSource, InputSourceError, InputSourceProvider};
use super::SourceNotification;
use crate::hud::IconRef;

type TISInputSourceRef = CFTypeRef;
type OSStatus = i32;
type CFNotificationCenterRef = *mut c_void;
type CFNotificationCallback = extern "C" fn(
    center: CFNotificationCenterRef,
    observer: *mut c_void,
    name: CFStringRef,
    object: *const c_void,
    user_info: CFDictionaryRef,
);

/// CFNotificationSuspensionBehaviorDeliverImmediately
const DELIVER_IMMEDIATELY: isize = 4;

#[link(name = "Carbon", kind = "framework")]
extern "C" {
    static kTISPropertyInputSourceCategory: CFStringRef;
    static kTISCategoryKeyboardInputSource: CFStringRef;
    static kTISPropertyInputSourceIsSelectCapable: CFStringRef;
    static kTISPropertyInputSourceID: CFStringRef;
    static kTISPropertyLocalizedName: CFStringRef;
    static kTISPropertyIconImageURL: CFStringRef;
    static kTISNotifySelectedKeyboardInputSourceChanged: CFStringRef;
    static kTISNotifyEnabledKeyboardInputSourcesChanged: CFStringRef;

    fn TISCopyCurrentKeyboardInputSource() -> TISInputSourceRef;
    fn TISCreateInputSourceList(properties: CFDictionaryRef, include_all_installed: u8) -> CFArrayRef;
    fn TISGetInputSourceProperty(source: TISInputSourceRef, key: CFStringRef) -> *const c_void;
    fn TISSelectInputSource(source: TISInputSourceRef) -> OSStatus;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFNotificationCenterGetDistributedCenter() -> CFNotificationCenterRef;
    fn CFNotificationCenterAddObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        callback: CFNotificationCallback,
        name: CFStringRef,
        object: *const c_void,
        suspension_behavior: isize,
    );
    fn CFNotificationCenterRemoveEveryObserver(center: CFNotificationCenterRef, observer: *const c_void);
}

unsafe fn string_property(source: TISInputSourceRef, key: CFStringRef) -> Option<String> {
    let value = TISGetInputSourceProperty(source, key);
    if value.is_null() {
        return None;
    }
    Some(CFString::wrap_under_get_rule(value as CFStringRef).to_string())
}

unsafe fn icon_property(source: TISInputSourceRef) -> Option<IconRef> {
    let value = TISGetInputSourceProperty(source, kTISPropertyIconImageURL);
    if value.is_null() {
        return None;
    }
    let url = CFURL::wrap_under_get_rule(value as CFURLRef);
    Some(IconRef(url.get_string().to_string()))
}

unsafe fn describe(source: TISInputSourceRef) -> Option<InputSource> {
    Some(InputSource {
        id: string_property(source, kTISPropertyInputSourceID)?,
        name: string_property(source, kTISPropertyLocalizedName)?,
        icon: icon_property(source),
    })
}

/// Enabled, select-capable keyboard sources
fn keyboard_source_list() -> Option<CFArray<CFType>> {
    unsafe {
        let filter = CFDictionary::from_CFType_pairs(&[
            (
                CFString::wrap_under_get_rule(kTISPropertyInputSourceCategory).as_CFType(),
                CFString::wrap_under_get_rule(kTISCategoryKeyboardInputSource).as_CFType(),
            ),
            (
                CFString::wrap_under_get_rule(kTISPropertyInputSourceIsSelectCapable).as_CFType(),
                CFBoolean::true_value().as_CFType(),
            ),
        ]);
        let list = TISCreateInputSourceList(filter.as_concrete_TypeRef(), 0);
        if list.is_null() {
            None
        } else {
            Some(CFArray::wrap_under_create_rule(list))
        }
    }
}

/// Input sources from Text Input Source Services
#[derive(Debug, Default)]
pub struct TisInputSources;

impl InputSourceProvider for TisInputSources {
    fn current(&self) -> Option<InputSource> {
        unsafe {
            let raw = TISCopyCurrentKeyboardInputSource();
            if raw.is_null() {
                return None;
            }
            let source = CFType::wrap_under_create_rule(raw);
            describe(source.as_CFTypeRef())
        }
    }

    fn selectable(&self) -> Vec<InputSource> {
        let Some(list) = keyboard_source_list() else {
            warn!("input source list unavailable");
            return Vec::new();
        };
        list.iter()
            .filter_map(|source| unsafe { describe(source.as_CFTypeRef()) })
            .collect()
    }

    fn select(&self, id: &str) -> Result<(), InputSourceError> {
        let list = keyboard_source_list().ok_or(InputSourceError::NoSources)?;
        for source in list.iter() {
            let raw = source.as_CFTypeRef();
            let matches = unsafe { string_property(raw, kTISPropertyInputSourceID) }
                .is_some_and(|candidate| candidate == id);
            if !matches {
                continue;
            }

            let status = unsafe { TISSelectInputSource(raw) };
            if status != 0 {
                return Err(InputSourceError::SelectFailed {
                    id: id.to_string(),
                    status,
                });
            }
            return Ok(());
        }
        Err(InputSourceError::UnknownSource(id.to_string()))
    }
}

type Handler = Box<dyn Fn(SourceNotification) + Send>;

extern "C" fn on_notification(
    _center: CFNotificationCenterRef,
    observer: *mut c_void,
    name: CFStringRef,
    _object: *const c_void,
    _user_info: CFDictionaryRef,
) {
    if observer.is_null() || name.is_null() {
        return;
    }

    let handler = unsafe { &*(observer as *const Handler) };
    let (name, selected) = unsafe {
        (
            CFString::wrap_under_get_rule(name),
            CFString::wrap_under_get_rule(kTISNotifySelectedKeyboardInputSourceChanged),
        )
    };

    let notification = if name == selected {
        SourceNotification::SelectedChanged
    } else {
        SourceNotification::EnabledChanged
    };
    handler(notification);
}

/// Registration of the input source observers.
///
/// Notifications are delivered through the run loop of the thread that
/// registered, so create this on a thread that runs a CFRunLoop. Dropping it
/// removes the observers.
pub struct SourceObserver {
    handler: *mut Handler,
}

impl SourceObserver {
    pub fn register(handler: impl Fn(SourceNotification) + Send + 'static) -> Self {
        let handler: *mut Handler = Box::into_raw(Box::new(Box::new(handler)));

        unsafe {
            let center = CFNotificationCenterGetDistributedCenter();
            for name in [
                kTISNotifySelectedKeyboardInputSourceChanged,
                kTISNotifyEnabledKeyboardInputSourcesChanged,
            ] {
                CFNotificationCenterAddObserver(
                    center,
                    handler as *const c_void,
                    on_notification,
                    name,
                    std::ptr::null(),
                    DELIVER_IMMEDIATELY,
                );
            }
        }

        debug!("input source observers registered");
        Self { handler }
    }
}

impl Drop for SourceObserver {
    fn drop(&mut self) {
        unsafe {
            CFNotificationCenterRemoveEveryObserver(
                CFNotificationCenterGetDistributedCenter(),
                self.handler as *const c_void,
            );
            drop(Box::from_raw(self.handler));
        }
        debug!("input source observers removed");
    }
}
