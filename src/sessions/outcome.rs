//! Placeholder up/down result attached to a closed session.
//! There is no market feed behind it: the draw is a fair coin.

use rand::Rng;

use crate::types::Outcome;

pub fn draw() -> Outcome {
    draw_with(&mut rand::thread_rng())
}

pub fn draw_with<R: Rng + ?Sized>(rng: &mut R) -> Outcome {
    if rng.gen_bool(0.5) {
        Outcome::Up
    } else {
        Outcome::Down
    }
}
