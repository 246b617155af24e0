pub mod pane_chrome;
pub mod spinner;
