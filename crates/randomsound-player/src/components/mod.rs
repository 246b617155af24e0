pub mod controls;
pub mod filter_bar;
pub mod header;
pub mod marquee;
pub mod track_meta;
pub mod visuals;
