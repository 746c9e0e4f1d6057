mod id_pool;
pub use self::id_pool::*;
