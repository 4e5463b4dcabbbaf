// Copyright @yucwang 2026

use crate::core::device::{Device, Event, KernelProgram};
use crate::core::error::TracerError;
use crate::core::rng::{LcgRng, RandomState};

use std::sync::Arc;

pub const SEED_KERNEL: &str = "random_state_seeder";

/// Fills per-lane generator state from one host integer seed.
///
/// The host generator is seeded with the integer seed and draws one 32-bit
/// value per lane; the seeding kernel expands each draw into a full
/// [`RandomState`]. Lane `i` only depends on the seed and `i`, so the same
/// seed always reproduces the same buffer.
pub struct RandomStateSeeder {
    device: Arc<Device>,
    program: KernelProgram,
}

impl RandomStateSeeder {
    pub fn new(device: Arc<Device>) -> Self {
        let program = device.program(SEED_KERNEL);
        Self { device, program }
    }

    pub fn is_ready(&self) -> bool {
        self.program.is_ready()
    }

    /// Seeds every lane of `buffer`. On any error the buffer is unchanged.
    pub fn seed(&self, buffer: &mut [RandomState], seed: u32, work_group_size: usize) -> Result<Event, TracerError> {
        self.seed_from(buffer, seed, 0, work_group_size)
    }

    /// Seeds `buffer` as the lanes starting at `first_lane` of a buffer seeded
    /// with `seed`, so a buffer can grow without replaying earlier lanes.
    pub fn seed_from(
        &self,
        buffer: &mut [RandomState],
        seed: u32,
        first_lane: usize,
        work_group_size: usize,
    ) -> Result<Event, TracerError> {
        if buffer.is_empty() {
            return Ok(Event::completed(SEED_KERNEL));
        }
        self.program.ensure_ready()?;

        let mut host_rng = LcgRng::new(seed as u64);
        for _ in 0..first_lane {
            host_rng.next_u32();
        }
        let draws: Vec<u32> = (0..buffer.len()).map(|_| host_rng.next_u32()).collect();
        let mut scratch = vec![RandomState::default(); buffer.len()];

        let result = self.device.dispatch(&self.program, work_group_size, &[], &mut scratch, |lane, state| {
            *state = RandomState::from_draw(draws[lane]);
            Ok(())
        });

        match result {
            Ok(event) => {
                buffer.copy_from_slice(&scratch);
                log::debug!("seeded {} random states from seed {} at lane {}", buffer.len(), seed, first_lane);
                Ok(event)
            }
            Err(err) => {
                if let TracerError::DeviceExecution { .. } = err {
                    log::error!("random state seeding aborted, buffer left untouched: {}", err);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::KernelProgram;

    #[test]
    fn test_seeding_is_deterministic() {
        let device = Arc::new(Device::with_workers(4));
        let seeder = RandomStateSeeder::new(device);

        let mut a = vec![RandomState::default(); 1000];
        let mut b = vec![RandomState::default(); 1000];
        seeder.seed(&mut a, 42, 64).expect("seed a");
        seeder.seed(&mut b, 42, 7).expect("seed b");
        assert_eq!(a, b);
        assert!(a.iter().all(|s| s.is_seeded()));

        let before = a.clone();
        seeder.seed(&mut a, 42, 64).expect("reseed");
        assert_eq!(a, before);

        seeder.seed(&mut b, 43, 64).expect("other seed");
        assert_ne!(a, b);
    }

    #[test]
    fn test_seeding_from_an_offset_extends_the_buffer() {
        let device = Arc::new(Device::with_workers(2));
        let seeder = RandomStateSeeder::new(device);
        let mut whole = vec![RandomState::default(); 48];
        seeder.seed(&mut whole, 21, 16).expect("seed whole");

        let mut tail = vec![RandomState::default(); 16];
        seeder.seed_from(&mut tail, 21, 32, 16).expect("seed tail");
        assert_eq!(tail.as_slice(), &whole[32..]);
    }

    #[test]
    fn test_lanes_are_distinct() {
        let device = Arc::new(Device::with_workers(2));
        let seeder = RandomStateSeeder::new(device);
        let mut states = vec![RandomState::default(); 512];
        seeder.seed(&mut states, 1, 32).expect("seed");
        let unique: std::collections::HashSet<_> = states.iter().collect();
        assert_eq!(unique.len(), states.len());
    }

    #[test]
    fn test_pending_kernel_leaves_buffer_unchanged() {
        let device = Arc::new(Device::with_workers(2));
        let program = KernelProgram::pending(SEED_KERNEL);
        device.register_program(program.clone());
        let seeder = RandomStateSeeder::new(device);
        assert!(!seeder.is_ready());

        let mut states = vec![RandomState::default(); 16];
        let err = seeder.seed(&mut states, 5, 8).unwrap_err();
        assert!(matches!(err, TracerError::CompilationPending(_)));
        assert!(states.iter().all(|s| !s.is_seeded()));

        program.mark_ready();
        assert!(seeder.is_ready());
        assert!(seeder.seed(&mut states, 5, 8).is_ok());
        assert!(states.iter().all(|s| s.is_seeded()));
    }

    #[test]
    fn test_device_fault_leaves_buffer_unchanged() {
        let device = Arc::new(Device::with_workers(2));
        let seeder = RandomStateSeeder::new(device.clone());
        let mut states = vec![RandomState::default(); 16];
        seeder.seed(&mut states, 9, 8).expect("seed");
        let before = states.clone();

        device.fail_next_dispatch();
        let err = seeder.seed(&mut states, 10, 8).unwrap_err();
        assert!(matches!(err, TracerError::DeviceExecution { .. }));
        assert_eq!(states, before);
    }
}
