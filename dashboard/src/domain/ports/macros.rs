//! `define_port_error!` declares a port's error enum together with its
//! conversion into the domain [`Error`](crate::domain::Error).
//!
//! Each variant names the domain constructor it maps to, followed by its
//! display text. The domain error is built from the full display text, so
//! the port's prefix survives even when an adapter supplies an empty
//! message.
//!
//! ```ignore
//! define_port_error! {
//!     pub enum ExampleError {
//!         Connection { message: String } =>
//!             backend_transient, "example connection failed: {message}",
//!     }
//! }
//! ```

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )?
                    => $maps_to:ident, $message:literal
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $(
                    #[doc = concat!("`", stringify!($field), "` detail.")]
                    $field : $ty
                ),* } )?,
            )*
        }

        impl $name {
            $(
                ::paste::paste! {
                    #[doc = concat!("Construct [`Self::", stringify!($variant), "`].")]
                    #[must_use]
                    pub fn [<$variant:snake>]($( $($field: impl Into<$ty>),* )?) -> Self {
                        Self::$variant $( { $($field: $field.into()),* } )?
                    }
                }
            )*
        }

        impl From<$name> for $crate::domain::Error {
            fn from(err: $name) -> Self {
                let message = err.to_string();
                match err {
                    $( $name::$variant { .. } => Self::$maps_to(message), )*
                }
            }
        }
    };
}

pub(crate) use define_port_error;
