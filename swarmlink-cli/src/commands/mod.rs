pub mod pull;
pub mod push;
pub mod watch;

use anyhow::{bail, Result};
use swarmlink_core::Category;

/// Resolve an optional `--category <dir>` filter to the categories to act on.
pub fn selected_categories(filter: Option<&str>) -> Result<Vec<Category>> {
    match filter {
        None => Ok(Category::ALL.to_vec()),
        Some(dir) => match Category::from_dir_name(dir) {
            Some(category) => Ok(vec![category]),
            None => {
                let known: Vec<&str> = Category::ALL.iter().map(|c| c.dir_name()).collect();
                bail!(
                    "unknown category '{dir}'; expected one of: {}",
                    known.join(", ")
                )
            }
        },
    }
}
