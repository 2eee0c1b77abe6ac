/*! Closed-form body model used for testing */

use std::{cell::Cell, collections::HashMap};

use crate::{
    body::{BodyModel, Jacobian},
    errors::{PostureError, Result},
    Pose,
};

pub const UPPER_ARM: f64 = 0.3;
pub const FOREARM: f64 = 0.25;
pub const NECK: f64 = 0.5;

/// A planar two-link arm rotating about z (group `arm`: `shoulder`, `elbow`; links `upper_arm`,
/// `hand`), a head nodding about x (group `head`: `neck`; link `head`) and an immobile `base`
/// controlled by the empty group `torso`.
///
/// Counts forward kinematics and Jacobian queries.
#[derive(Debug)]
pub struct DummyBody {
    joint_names: Vec<String>,
    pub current: Vec<f64>,
    pub limits: Vec<(f64, f64)>,
    pub fk_calls: Cell<usize>,
    pub jacobian_calls: Cell<usize>,
}

impl DummyBody {
    pub fn new(current: &[f64]) -> Self {
        Self {
            joint_names: vec!["shoulder".into(), "elbow".into(), "neck".into()],
            current: current.to_vec(),
            limits: vec![(-3.0, 3.0), (-2.5, 2.5), (-1.0, 1.0)],
            fk_calls: Cell::new(0),
            jacobian_calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> (usize, usize) {
        (self.fk_calls.get(), self.jacobian_calls.get())
    }

    fn pose(joints: &[f64], link: &str) -> Result<Pose<f64>> {
        let (shoulder, elbow, neck) = (joints[0], joints[1], joints[2]);
        let elbow_position = [UPPER_ARM * shoulder.cos(), UPPER_ARM * shoulder.sin(), 0.0];
        match link {
            "base" => Ok(Pose::from_position([0.0, 0.0, 0.0])),
            "upper_arm" => Ok(Pose::new(elbow_position, rotation_z(shoulder))),
            "hand" => {
                let angle = shoulder + elbow;
                Ok(Pose::new(
                    [
                        elbow_position[0] + FOREARM * angle.cos(),
                        elbow_position[1] + FOREARM * angle.sin(),
                        0.0,
                    ],
                    rotation_z(angle),
                ))
            }
            "head" => Ok(Pose::new(
                [0.0, 0.0, NECK],
                [(neck / 2.0).sin(), 0.0, 0.0, (neck / 2.0).cos()],
            )),
            _ => Err(PostureError::UnknownLink(link.to_string())),
        }
    }
}

fn rotation_z(angle: f64) -> [f64; 4] {
    [0.0, 0.0, (angle / 2.0).sin(), (angle / 2.0).cos()]
}

/// z x (p - pivot)
fn lever_z(p: &[f64; 3], pivot: &[f64; 3]) -> [f64; 6] {
    [-(p[1] - pivot[1]), p[0] - pivot[0], 0.0, 0.0, 0.0, 1.0]
}

impl BodyModel<f64> for DummyBody {
    fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    fn joint_limits(&self) -> Vec<(f64, f64)> {
        self.limits.clone()
    }

    fn current_configuration(&self) -> Vec<f64> {
        self.current.clone()
    }

    fn forward_kinematics(&self, joints: &[f64], links: &[&str]) -> Result<HashMap<String, Pose<f64>>> {
        self.fk_calls.set(self.fk_calls.get() + 1);
        links
            .iter()
            .map(|link| Ok((link.to_string(), Self::pose(joints, link)?)))
            .collect()
    }

    fn jacobian(&self, group: &str, joints: &[f64], link: &str) -> Result<Jacobian<f64>> {
        self.jacobian_calls.set(self.jacobian_calls.get() + 1);
        let position = Self::pose(joints, link)?.position;
        let elbow = Self::pose(joints, "upper_arm")?.position;
        match (group, link) {
            ("arm", "upper_arm") => Ok(Jacobian::from_columns(&[lever_z(&position, &[0.0; 3]), [0.0; 6]])),
            ("arm", "hand") => Ok(Jacobian::from_columns(&[
                lever_z(&position, &[0.0; 3]),
                lever_z(&position, &elbow),
            ])),
            ("head", "head") => Ok(Jacobian::from_columns(&[[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]])),
            ("torso", "base") => Ok(Jacobian::zeros(0)),
            ("arm" | "head" | "torso", _) => Err(PostureError::UnknownLink(link.to_string())),
            _ => Err(PostureError::UnknownGroup(group.to_string())),
        }
    }

    fn controlling_group(&self, link: &str) -> Result<String> {
        match link {
            "upper_arm" | "hand" => Ok("arm".into()),
            "head" => Ok("head".into()),
            "base" => Ok("torso".into()),
            _ => Err(PostureError::UnknownLink(link.to_string())),
        }
    }

    fn group_joints(&self, group: &str) -> Result<Vec<String>> {
        match group {
            "arm" => Ok(vec!["shoulder".into(), "elbow".into()]),
            "head" => Ok(vec!["neck".into()]),
            "torso" => Ok(vec![]),
            _ => Err(PostureError::UnknownGroup(group.to_string())),
        }
    }
}
