pub mod elevenlabs;
pub mod freesound;
pub mod pixabay;
