pub mod customer;
pub mod vendor;

use rand::Rng;

/// Uniform batch size over `[1, rate]` inclusive, shared by vendor releases
/// and customer purchases so both sides use the same bound.
pub(crate) fn draw_batch_size(rate: u32) -> u32 {
    rand::thread_rng().gen_range(1..=rate)
}
