pub mod app;
mod draw;
mod panes;
mod selection;
