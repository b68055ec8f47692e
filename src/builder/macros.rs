//! Macros for declaring user events.

/// Declare a namespace of user event flags.
///
/// Each name becomes an associated [`EventCode`](crate::core::EventCode)
/// constant, numbered with `EventCode::user_flag` in declaration order, so
/// every event is a single bit and works in both delivery modes. `ALL`
/// lists them for [`MachineBuilder::user_events`](crate::builder::MachineBuilder::user_events).
/// Declaring more events than the signal word has free bits fails to
/// compile.
///
/// # Example
///
/// ```
/// use hsm_dispatch::core::EventCode;
/// use hsm_dispatch::user_events;
///
/// user_events! {
///     pub struct Button {
///         PRESSED,
///         RELEASED,
///     }
/// }
///
/// assert_eq!(Button::PRESSED, EventCode::user_flag(0));
/// assert_eq!(Button::RELEASED, EventCode::user_flag(1));
/// assert_eq!(Button::ALL.len(), 2);
/// assert_eq!(Button::name_of(Button::RELEASED), Some("RELEASED"));
/// ```
#[macro_export]
macro_rules! user_events {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$event_meta:meta])*
                $event:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug)]
        $vis struct $name;

        const _: () = {
            #[allow(non_camel_case_types, dead_code, clippy::upper_case_acronyms)]
            enum Ordinal {
                $($event),*
            }

            impl $name {
                $(
                    $(#[$event_meta])*
                    pub const $event: $crate::core::EventCode =
                        $crate::core::EventCode::user_flag(Ordinal::$event as u32);
                )*

                pub const ALL: &'static [$crate::core::EventCode] = &[$(Self::$event),*];

                /// Declared name of `code`, if it belongs to this namespace.
                pub fn name_of(code: $crate::core::EventCode) -> Option<&'static str> {
                    $(
                        if code == Self::$event {
                            return Some(stringify!($event));
                        }
                    )*
                    None
                }
            }
        };
    };
}
