use rand::Rng;
#[cfg(test)] use std::sync::Mutex;


#[cfg(test)]
/// automock expectations for static methods are global - hold this lock to avoid races
pub static MOCK_RANDOM_MUTEX: Mutex<()> = Mutex::new(());

#[cfg_attr(test, mockall::automock)]
pub trait Random {
    fn next_request_id() -> u16;
}
pub struct RngRandom {}
impl Random for RngRandom {
    fn next_request_id() -> u16 {
        rand::thread_rng().gen()
    }
}
