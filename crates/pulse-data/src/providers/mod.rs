//! Quote provider adapters.

mod eastmoney;
mod mock;
mod sina;

pub use eastmoney::EastmoneyProvider;
pub use mock::MockProvider;
pub use sina::SinaProvider;
