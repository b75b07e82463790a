pub mod currency_api;
pub mod util;
pub mod world_bank;

pub use currency_api::CurrencyApiProvider;
pub use world_bank::WorldBankProvider;
