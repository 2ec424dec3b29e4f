pub mod alert;
pub mod candle_merge;
pub mod candle_store;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod history;
pub mod indicator;
pub mod input;
pub mod model;
pub mod pipeline;
pub mod ui;
