pub mod cronjobs;
pub mod health;
