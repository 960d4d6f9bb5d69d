/// Emits the statics and `tether_<element>_*` entry points for one element type.
///
/// `$element` names the family; `$marshal` is the [`Marshal`](crate::Marshal)
/// implementation converting its elements.
macro_rules! sequence_adapter {
    ($element:ident, $marshal:ty) => {
        paste::paste! {
            #[doc = "Proxy behind the `tether_" $element "_*` entry points."]
            pub static [<$element:upper _ADAPTER>]: $crate::ffi::AdapterSlot<$marshal> =
                $crate::ffi::AdapterSlot::new(stringify!($element));

            #[doc = "Callback table the foreign side registered for its own `" $element "` sequences."]
            pub static [<$element:upper _FOREIGN>]: $crate::foreign::ForeignSlot =
                $crate::foreign::ForeignSlot::new(stringify!($element));

            #[doc = "Installs the `" $element "` adapter with the default configuration."]
            ///
            /// Returns `1` if the adapter was already installed.
            #[unsafe(no_mangle)]
            pub extern "C" fn [<tether_ $element _init>]() -> i32 {
                $crate::ffi::init(&[<$element:upper _ADAPTER>], $crate::config::BridgeConfig::default())
            }

            #[doc = "Installs the `" $element "` adapter with a JSON configuration."]
            ///
            /// An empty document means the defaults. Returns `1` if the adapter was
            /// already installed, in which case the configuration is ignored.
            ///
            /// # Safety
            /// `json` must be null (only when `len` is zero) or valid for reads of `len` bytes.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn [<tether_ $element _init_with_config>](json: *const u8, len: usize) -> i32 {
                // SAFETY: forwarded from the caller.
                unsafe { $crate::ffi::init_with_config(&[<$element:upper _ADAPTER>], json, len) }
            }

            #[doc = "Uninstalls the `" $element "` adapter, releasing every collection still exposed."]
            ///
            /// Returns the number of leaked collections, or `-1` when the leak policy
            /// is `fail` and collections leaked.
            #[unsafe(no_mangle)]
            pub extern "C" fn [<tether_ $element _shutdown>]() -> i64 {
                $crate::ffi::shutdown(&[<$element:upper _ADAPTER>])
            }

            /// Returns `0` if no collection is exposed, `-1` with a leak report otherwise.
            #[unsafe(no_mangle)]
            pub extern "C" fn [<tether_ $element _check_empty>]() -> i32 {
                $crate::ffi::check_empty(&[<$element:upper _ADAPTER>])
            }

            /// Creates an empty collection. Returns `0` on failure.
            #[unsafe(no_mangle)]
            pub extern "C" fn [<tether_ $element _create>]() -> $crate::handle::RawHandle {
                $crate::ffi::create(&[<$element:upper _ADAPTER>])
            }

            /// Appends a copy of `element`. The caller keeps ownership of the buffer.
            ///
            /// # Safety
            /// `element` must be null or point to a live `WireBuffer` for the duration of the call.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn [<tether_ $element _add>](
                handle: $crate::handle::RawHandle,
                element: *const $crate::wire::WireBuffer,
            ) {
                // SAFETY: forwarded from the caller.
                unsafe { $crate::ffi::add(&[<$element:upper _ADAPTER>], handle, element) }
            }

            /// Number of elements in the collection.
            #[unsafe(no_mangle)]
            pub extern "C" fn [<tether_ $element _get_size>](handle: $crate::handle::RawHandle) -> usize {
                $crate::ffi::get_size(&[<$element:upper _ADAPTER>], handle)
            }

            /// Copy of the element at `index`, owned by the caller. Null on failure.
            #[unsafe(no_mangle)]
            pub extern "C" fn [<tether_ $element _get_elem>](
                handle: $crate::handle::RawHandle,
                index: usize,
            ) -> *mut $crate::wire::WireBuffer {
                $crate::ffi::get_elem(&[<$element:upper _ADAPTER>], handle, index)
            }

            /// Destroys the collection. The handle must not be used again.
            #[unsafe(no_mangle)]
            pub extern "C" fn [<tether_ $element _delete>](handle: $crate::handle::RawHandle) {
                $crate::ffi::delete(&[<$element:upper _ADAPTER>], handle);
            }

            extern "C" fn [<$element _table_add>](
                handle: $crate::handle::RawHandle,
                element: *const $crate::wire::WireBuffer,
            ) {
                // SAFETY: callers of a callback table must pass null or a live buffer.
                unsafe { [<tether_ $element _add>](handle, element) }
            }

            #[doc = "Capability table over the host's `" $element "` collections."]
            #[unsafe(no_mangle)]
            pub extern "C" fn [<tether_ $element _callbacks>]() -> $crate::foreign::SequenceCallbacks {
                $crate::foreign::SequenceCallbacks {
                    create: [<tether_ $element _create>],
                    add: [<$element _table_add>],
                    get_size: [<tether_ $element _get_size>],
                    get_elem: [<tether_ $element _get_elem>],
                    delete: [<tether_ $element _delete>],
                }
            }

            #[doc = "Registers the foreign side's callback table for `" $element "` sequences."]
            ///
            /// Returns `1` if the identical table was already registered and `-1` if a
            /// different one was.
            ///
            /// # Safety
            /// `table` must be null or point to a valid `SequenceCallbacks`.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn [<tether_ $element _register_foreign>](
                table: *const $crate::foreign::SequenceCallbacks,
            ) -> i32 {
                // SAFETY: forwarded from the caller.
                unsafe { $crate::ffi::register_foreign(&[<$element:upper _FOREIGN>], table) }
            }
        }
    };
}
