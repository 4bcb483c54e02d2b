pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, info, section, success, summary_row, warn};
pub use table::{render, stats_table, GroupRow, TableBuilder};
pub use theme::{theme, Theme};
