pub mod intake; // Upload checks and data URLs
pub mod preprocess; // Optional 1024x1024 grayscale normalisation
pub mod cache; // Fingerprint-keyed 24h result cache
pub mod analysis; // Remote interpretation, decoding, threshold rule
pub mod heatmap; // Region overlay compositor
pub mod simulator; // What-if risk reduction
