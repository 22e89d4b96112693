use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident => $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0.simple())
            }
        }
    };
}

handle!(
    /// The browser process one adapter drives.
    BrowserId => "browser"
);
handle!(
    /// A tab. Stable for the tab's lifetime even when its CDP session is replaced.
    PageId => "page"
);
