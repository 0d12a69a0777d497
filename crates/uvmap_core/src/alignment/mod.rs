pub mod procrustes;
