//! Renderizado de respuestas para los comandos con prefijo.

pub mod embeds;
