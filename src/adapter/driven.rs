pub mod activity_log;
pub mod console_logger;
pub mod directory_repository;
pub mod in_memory;
pub mod order_repository;
pub mod payment_gateway;
pub mod payment_repository;
pub mod stock_repository;
pub mod transfer_repository;

pub use activity_log::MySqlActivityLog;
pub use console_logger::ConsoleLogger;
pub use directory_repository::{MySqlBranchDirectory, MySqlProductCatalog};
pub use in_memory::{
    InMemoryActivityLog, InMemoryBranchDirectory, InMemoryOrderRepository,
    InMemoryPaymentRepository, InMemoryProductCatalog, InMemoryStockRepository,
    InMemoryTransferRepository,
};
pub use order_repository::MySqlOrderRepository;
pub use payment_gateway::{GatewayConfig, HttpPaymentGateway};
pub use payment_repository::MySqlPaymentRepository;
pub use stock_repository::MySqlStockRepository;
pub use transfer_repository::MySqlTransferRepository;
