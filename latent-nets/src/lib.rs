pub mod candle_aux_layers;
pub mod candle_config;
pub mod candle_decoder_image;
pub mod candle_diag_gaussian;
pub mod candle_encoder_image;
pub mod candle_gaussian_head;
pub mod candle_latent_network;
pub mod candle_model_traits;
pub mod candle_param_init;
pub mod candle_task_network;
pub mod cli;

pub use candle_core;
pub use candle_nn;
