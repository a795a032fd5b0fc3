pub mod factory;
pub mod mistral;
pub mod openai;

pub use factory::create_provider;
pub use mistral::MistralProvider;
pub use openai::OpenAiProvider;
