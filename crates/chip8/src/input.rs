use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc,
};

/// Number of keys on the Chip8 keypad.
pub const KEY_COUNT: usize = 16;

/// Latch value meaning "no key pressed since the wait began".
const NO_KEY: u8 = 0xFF;

struct KeyState {
    keys: [AtomicBool; KEY_COUNT],
    latched: AtomicU8,
}

impl Default for KeyState {
    fn default() -> Self {
        Self {
            keys: Default::default(),
            latched: AtomicU8::new(NO_KEY),
        }
    }
}

/// Shared handle to the keypad state.
///
/// Cloning the handle is cheap, and every clone can press or release keys from
/// any thread. Key codes are truncated to their lowest 4 bits.
#[derive(Clone, Default)]
pub struct KeypadHandle(Arc<KeyState>);

impl KeypadHandle {
    /// Press the key, latching it if no other key was pressed since the
    /// current wait began.
    pub fn press(&self, key_code: u8) {
        let key = key_code & 0xF;
        self.0.keys[usize::from(key)].store(true, Ordering::SeqCst);
        // only the first press is latched
        let _ = self
            .0
            .latched
            .compare_exchange(NO_KEY, key, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Release the key.
    pub fn release(&self, key_code: u8) {
        self.0.keys[usize::from(key_code & 0xF)].store(false, Ordering::SeqCst);
    }

    /// Returns whether the given key is currently pressed.
    pub fn is_pressed(&self, key_code: u8) -> bool {
        self.0.keys[usize::from(key_code & 0xF)].load(Ordering::SeqCst)
    }
}

/// Input system for the `Chip8`. Keeps track of the pressed state of all 16
/// keys, as well as the first key pressed since a program started waiting
/// for one.
#[derive(Default)]
pub struct Input {
    state: KeypadHandle,
}

impl Input {
    /// Create a new [`Input`] instance with every key released.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that can update this keypad from another thread.
    pub fn handle(&self) -> KeypadHandle {
        self.state.clone()
    }

    /// Update the input state of the given key code.
    pub fn update(&self, key_code: u8, pressed: bool) {
        if pressed {
            self.state.press(key_code);
        } else {
            self.state.release(key_code);
        }
    }

    /// Returns whether the given key is currently pressed.
    pub fn is_key_pressed(&self, key_code: u8) -> bool {
        self.state.is_pressed(key_code)
    }

    /// Forget any press that happened before now, a program has started
    /// waiting for a fresh one.
    pub fn begin_wait(&self) {
        self.state.0.latched.store(NO_KEY, Ordering::SeqCst);
    }

    /// Take the first key pressed since `begin_wait`, if any.
    pub fn take_press(&self) -> Option<u8> {
        match self.state.0.latched.swap(NO_KEY, Ordering::SeqCst) {
            NO_KEY => None,
            key => Some(key),
        }
    }

    /// Release every key and drop any latched press.
    pub fn release_all(&self) {
        for key in self.state.0.keys.iter() {
            key.store(false, Ordering::SeqCst);
        }
        self.begin_wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let input = Input::new();
        input.update(0xA, true);
        assert!(input.is_key_pressed(0xA));
        assert!(!input.is_key_pressed(0xB));
        input.update(0xA, false);
        assert!(!input.is_key_pressed(0xA));
    }

    #[test]
    fn test_key_codes_are_truncated() {
        let input = Input::new();
        input.update(0x13, true);
        assert!(input.is_key_pressed(0x3));
        assert!(input.is_key_pressed(0xF3));
    }

    #[test]
    fn test_first_press_is_latched() {
        let input = Input::new();
        input.begin_wait();
        input.update(0x7, true);
        input.update(0x2, true);
        assert_eq!(input.take_press(), Some(0x7));
        assert_eq!(input.take_press(), None);
    }

    #[test]
    fn test_latched_press_survives_release() {
        let input = Input::new();
        input.begin_wait();
        input.update(0x5, true);
        input.update(0x5, false);
        assert_eq!(input.take_press(), Some(0x5));
    }

    #[test]
    fn test_begin_wait_forgets_earlier_press() {
        let input = Input::new();
        input.update(0x1, true);
        input.begin_wait();
        assert_eq!(input.take_press(), None);
    }

    #[test]
    fn test_handle_from_other_thread() {
        let input = Input::new();
        let handle = input.handle();
        std::thread::spawn(move || handle.press(0xC)).join().unwrap();
        assert!(input.is_key_pressed(0xC));
    }

    #[test]
    fn test_release_all() {
        let input = Input::new();
        input.update(0x0, true);
        input.update(0xF, true);
        input.release_all();
        assert!((0..16).all(|k| !input.is_key_pressed(k)));
        assert_eq!(input.take_press(), None);
    }
}
