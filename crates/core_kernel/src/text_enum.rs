//! Status enums stored as text
//!
//! Every lifecycle status in the marketplace is persisted as a lowercase
//! snake_case string and exchanged in JSON the same way. `text_enum!`
//! declares such an enum together with `as_str`, `Display`, `FromStr` and
//! the matching serde names.

/// Declares a fieldless enum whose variants map to fixed strings
///
/// ```rust,ignore
/// core_kernel::text_enum! {
///     /// Claim status
///     pub enum ClaimStatus {
///         Submitted => "submitted",
///         UnderReview => "under_review",
///     }
/// }
/// assert_eq!("under_review".parse::<ClaimStatus>()?, ClaimStatus::UnderReview);
/// ```
#[macro_export]
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        $vis enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::CoreError::validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::text_enum! {
        /// Sample
        pub enum Light {
            Red => "red",
            AmberFlashing => "amber_flashing",
        }
    }

    #[test]
    fn test_text_round_trip() {
        for light in Light::ALL {
            assert_eq!(light.as_str().parse::<Light>().unwrap(), *light);
        }
        assert_eq!(Light::AmberFlashing.to_string(), "amber_flashing");
        assert!("green".parse::<Light>().is_err());
    }

    #[test]
    fn test_serde_uses_text() {
        assert_eq!(serde_json::to_string(&Light::AmberFlashing).unwrap(), "\"amber_flashing\"");
    }
}
