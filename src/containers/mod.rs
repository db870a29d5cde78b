mod cow_vec;
mod keyed_vec;

pub(crate) use cow_vec::CowVec;
pub use keyed_vec::KeyedVec;
pub use keyed_vec::StorageKey;
