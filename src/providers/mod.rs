pub mod exchange_rates;
pub mod poloniex;
pub mod quandl;
pub mod util;

pub use exchange_rates::ExchangeRatesProvider;
pub use poloniex::PoloniexProvider;
pub use quandl::QuandlProvider;
