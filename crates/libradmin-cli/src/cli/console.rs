//! Terminal adapters for notices and navigation.

use libradmin_core::notify::{Notice, NoticeLevel, Notifier};
use libradmin_core::routes::{Navigator, Route};

/// Success notices go to stdout, everything else to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Loading => eprintln!("{}", notice.message),
            NoticeLevel::Success => println!("{}", notice.message),
            NoticeLevel::Error => eprintln!("Error: {}", notice.message),
        }
    }
}

/// A terminal has no views to swap; the target route is announced instead.
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: Route) {
        eprintln!("→ {route}");
    }
}
