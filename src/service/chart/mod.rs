pub mod candlestick;

pub use candlestick::render_candlestick;
