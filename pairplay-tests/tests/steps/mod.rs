mod message_steps;
mod session_steps;
mod voice_steps;
