//! Terminal coloring
//!
//! Diagnostics are colored using the
//! [Colored crate](https://docs.rs/colored/latest/colored/).
//! Use of this crate is behind the `color` Cargo feature.
//!
//! The module contains a single trait [`Colorize`].
//! When the feature is enabled, the trait forwards all method calls to the Colored crate.
//! When the feature is disabled, the trait is a no-op.
//! In both cases downstream code can just call methods on the trait:
//!
//! ```
//! use rofflang::color::Colorize;
//! println!["{}", "warning:".bold().bright_yellow()];
//! ```

#[cfg(feature = "color")]
pub type ColoredString = colored::ColoredString;

#[cfg(not(feature = "color"))]
pub type ColoredString = String;

macro_rules! colorize_impl {
    ( $( $method_name: ident, )+ ) => {
        /// Trait that provides coloring methods on strings.
        ///
        /// See the module documentation for information.
        pub trait Colorize {
            $(
                fn $method_name(self) -> ColoredString;
            )+
        }
        #[cfg(feature="color")]
        impl Colorize for ColoredString {
            $(
                fn $method_name(self) -> ColoredString {
                    colored::Colorize::$method_name(self)
                }
            )+
        }
        #[cfg(feature="color")]
        impl Colorize for &str {
            $(
                fn $method_name(self) -> ColoredString {
                    colored::Colorize::$method_name(self)
                }
            )+
        }
        #[cfg(not(feature="color"))]
        impl Colorize for ColoredString {
            $(
                fn $method_name(self) -> ColoredString {
                    self
                }
            )+
        }
        #[cfg(not(feature="color"))]
        impl Colorize for &str {
            $(
                fn $method_name(self) -> ColoredString {
                    self.to_string()
                }
            )+
        }
    };
}

colorize_impl!(bold, bright_red, bright_yellow, bright_cyan, dimmed,);
