// src/lib.rs
// Point d'entrée de la bibliothèque de l'ordonnanceur MQSS
#![cfg_attr(not(test), no_std)] // Pas de bibliothèque standard hors tests

// Import de alloc pour les allocations dynamiques
extern crate alloc;

// Modules du noyau
pub mod arch;
pub mod logger;
pub mod scheduler;
pub mod sync;

pub use scheduler::{Scheduler, SchedConfig, SchedulingPolicy};
