//! Terminal front end: charts, the menu loop and config setup

pub mod chart;
pub mod driver;
pub mod setup;
pub mod ui;
