// Public (no auth): service info and health
pub mod system;
// Admin JWT required: batch provisioning under /api/provision/*
pub mod provision;
