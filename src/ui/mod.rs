pub mod code;
pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use code::{numbered, render_code, render_excerpt};
pub use icons::Icons;
pub use output::{dim, error, header, info, muted, section, status, strong, success, summary_row, warn};
pub use table::{counts_table, databases_table, TableBuilder};
pub use theme::{theme, Theme};
