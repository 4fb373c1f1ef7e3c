pub mod memory;
pub mod store;
pub mod supabase;
pub mod supabase_store;

pub use memory::MemoryStore;
pub use store::{
    AppointmentFilter, ClinicReader, ClinicStore, ClinicTransaction, StoreError, VisitFilter,
};
pub use supabase::{SupabaseClient, SupabaseError};
pub use supabase_store::SupabaseStore;
