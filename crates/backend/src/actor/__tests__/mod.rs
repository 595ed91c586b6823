pub(crate) mod helpers;

mod dedup;
mod watcher;
