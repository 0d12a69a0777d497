//! Layout of the SMPL body model and of the 14 point LSP annotations
//! (ankles, knees, hips, wrists, elbows, shoulders, neck, head top).

pub const NUM_BODY_JOINTS: usize = 23;
pub const NUM_JOINTS: usize = NUM_BODY_JOINTS + 1;
pub const NUM_VERTS: usize = 6890;
pub const POSE_DIM: usize = NUM_JOINTS * 3;
pub const SHAPE_SPACE_DIM: usize = 10;
pub const NUM_LANDMARKS: usize = 14;
