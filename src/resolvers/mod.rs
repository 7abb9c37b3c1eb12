pub mod browser;
pub mod consent;
pub mod redirect;
pub mod traits;

pub use browser::{BrowserSettings, ChromeNavigator};
pub use consent::{ConsentSession, ConsentSettings};
pub use redirect::{HttpRedirectResolver, RedirectSettings};
pub use traits::{BrowserNavigator, PageDriver, RedirectResolver};
