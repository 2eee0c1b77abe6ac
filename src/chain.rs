//! Reference [BodyModel] with revolute joints arranged in a tree, using
//! [nalgebra](https://docs.rs/nalgebra) for the spatial algebra.
//!
//! Each joint connects a parent link (or the world) to exactly one child link. The child frame is
//! `parent * origin * rotation(axis, q)`. Joints have to be added parents first, so the joint order
//! is also a valid order for accumulating transformations from the root.

use std::collections::HashMap;

use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};

use crate::{
    body::{BodyModel, Jacobian},
    errors::{PostureError, Result},
    Pose,
};

/// A revolute joint and the link it moves
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    /// Link moved by this joint
    pub link: String,
    /// Index of the parent joint (`None` for joints attached to the world)
    parent: Option<usize>,
    pub origin: Isometry3<f64>,
    pub axis: Unit<Vector3<f64>>,
    pub limits: (f64, f64),
}

#[derive(Debug, Clone)]
struct Group {
    joints: Vec<String>,
    /// Joint indices in column order
    columns: Vec<usize>,
    links: Vec<String>,
}

/// A kinematic tree of revolute joints with named joint groups.
#[derive(Debug, Clone, Default)]
pub struct KinematicBody {
    joints: Vec<Joint>,
    joint_names: Vec<String>,
    /// link name -> index of the joint that moves it
    links: HashMap<String, usize>,
    groups: HashMap<String, Group>,
    /// link name -> group name
    link_groups: HashMap<String, String>,
    configuration: Vec<f64>,
}

impl KinematicBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a revolute joint moving `link`, attached to `parent_link` (or to the world).
    ///
    /// The new joint's position in the current configuration is the one closest to zero within
    /// its limits. A zero-length `axis` is rejected with [PostureError::InvalidAxis].
    pub fn add_joint(
        &mut self,
        name: &str,
        link: &str,
        parent_link: Option<&str>,
        origin: Isometry3<f64>,
        axis: Vector3<f64>,
        limits: (f64, f64),
    ) -> Result<&mut Self> {
        if self.joint_names.iter().any(|n| n == name) {
            return Err(PostureError::DuplicateName(name.to_string()));
        }
        if self.links.contains_key(link) {
            return Err(PostureError::DuplicateName(link.to_string()));
        }
        if !(limits.0 <= limits.1) {
            return Err(PostureError::InvalidBounds {
                joint: name.to_string(),
                lower: limits.0,
                upper: limits.1,
            });
        }
        let parent = parent_link
            .map(|p| {
                self.links
                    .get(p)
                    .copied()
                    .ok_or_else(|| PostureError::UnknownLink(p.to_string()))
            })
            .transpose()?;
        let axis = Unit::try_new(axis, f64::EPSILON).ok_or_else(|| PostureError::InvalidAxis(name.to_string()))?;

        self.links.insert(link.to_string(), self.joints.len());
        self.joint_names.push(name.to_string());
        self.configuration.push(0.0_f64.clamp(limits.0, limits.1));
        self.joints.push(Joint {
            name: name.to_string(),
            link: link.to_string(),
            parent,
            origin,
            axis,
            limits,
        });
        Ok(self)
    }

    /// Defines a group of joints (in Jacobian column order) and the links it controls.
    pub fn add_group(&mut self, name: &str, joints: &[&str], links: &[&str]) -> Result<&mut Self> {
        if self.groups.contains_key(name) {
            return Err(PostureError::DuplicateName(name.to_string()));
        }
        let columns = joints
            .iter()
            .map(|joint| self.joint_index(joint))
            .collect::<Result<Vec<_>>>()?;
        for link in links {
            if !self.links.contains_key(*link) {
                return Err(PostureError::UnknownLink(link.to_string()));
            }
            if self.link_groups.contains_key(*link) {
                return Err(PostureError::DuplicateName(link.to_string()));
            }
        }
        links.iter().for_each(|link| {
            self.link_groups.insert(link.to_string(), name.to_string());
        });
        self.groups.insert(
            name.to_string(),
            Group {
                joints: joints.iter().map(|j| j.to_string()).collect(),
                columns,
                links: links.iter().map(|l| l.to_string()).collect(),
            },
        );
        Ok(self)
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Links controlled by a group
    pub fn group_links(&self, group: &str) -> Result<&[String]> {
        self.groups
            .get(group)
            .map(|g| g.links.as_slice())
            .ok_or_else(|| PostureError::UnknownGroup(group.to_string()))
    }

    /// Sets the configuration used to seed inverse kinematics
    pub fn set_configuration(&mut self, joints: &[f64]) -> Result<()> {
        self.check_dimension(joints)?;
        self.configuration = joints.to_vec();
        Ok(())
    }

    /// World frames of all links (indexed like the joints)
    pub fn frames(&self, joints: &[f64]) -> Result<Vec<Isometry3<f64>>> {
        self.check_dimension(joints)?;
        let mut frames: Vec<Isometry3<f64>> = Vec::with_capacity(self.joints.len());
        for (joint, q) in self.joints.iter().zip(joints) {
            let parent = joint.parent.map(|p| frames[p]).unwrap_or_else(Isometry3::identity);
            let rotation = UnitQuaternion::from_axis_angle(&joint.axis, *q);
            frames.push(parent * joint.origin * Isometry3::from_parts(Translation3::identity(), rotation));
        }
        Ok(frames)
    }

    fn link_index(&self, link: &str) -> Result<usize> {
        self.links
            .get(link)
            .copied()
            .ok_or_else(|| PostureError::UnknownLink(link.to_string()))
    }

    fn joint_index(&self, joint: &str) -> Result<usize> {
        self.joint_names
            .iter()
            .position(|n| n == joint)
            .ok_or_else(|| PostureError::UnknownJoint(joint.to_string()))
    }

    /// Whether `ancestor` lies on the path from the world to `joint` (inclusive)
    fn moves(&self, ancestor: usize, joint: usize) -> bool {
        let mut current = Some(joint);
        while let Some(index) = current {
            if index == ancestor {
                return true;
            }
            current = self.joints[index].parent;
        }
        false
    }

    fn check_dimension(&self, joints: &[f64]) -> Result<()> {
        if joints.len() != self.joints.len() {
            return Err(PostureError::DimensionMismatch {
                expected: self.joints.len(),
                found: joints.len(),
            });
        }
        Ok(())
    }
}

impl From<&Isometry3<f64>> for Pose<f64> {
    fn from(frame: &Isometry3<f64>) -> Self {
        let t = &frame.translation.vector;
        // nalgebra stores quaternion coordinates as (i, j, k, w)
        let q = &frame.rotation.coords;
        Pose::new([t.x, t.y, t.z], [q[0], q[1], q[2], q[3]])
    }
}

impl BodyModel<f64> for KinematicBody {
    fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    fn joint_limits(&self) -> Vec<(f64, f64)> {
        self.joints.iter().map(|j| j.limits).collect()
    }

    fn current_configuration(&self) -> Vec<f64> {
        self.configuration.clone()
    }

    fn forward_kinematics(&self, joints: &[f64], links: &[&str]) -> Result<HashMap<String, Pose<f64>>> {
        let frames = self.frames(joints)?;
        links
            .iter()
            .map(|link| Ok((link.to_string(), Pose::from(&frames[self.link_index(link)?]))))
            .collect()
    }

    fn jacobian(&self, group: &str, joints: &[f64], link: &str) -> Result<Jacobian<f64>> {
        let group = self
            .groups
            .get(group)
            .ok_or_else(|| PostureError::UnknownGroup(group.to_string()))?;
        let target = self.link_index(link)?;
        let frames = self.frames(joints)?;
        let effector: Point3<f64> = frames[target].translation.vector.into();

        let mut jacobian = Jacobian::zeros(group.joints.len());
        for (column, &index) in group.columns.iter().enumerate() {
            if !self.moves(index, target) {
                continue;
            }
            // Formula: axis_in_world x (effector_in_world - pivot_in_world)
            let axis = frames[index].rotation * self.joints[index].axis.into_inner();
            let pivot: Point3<f64> = frames[index].translation.vector.into();
            let linear = axis.cross(&(effector - pivot));
            jacobian
                .column_mut(column)
                .copy_from_slice(&[linear.x, linear.y, linear.z, axis.x, axis.y, axis.z]);
        }
        Ok(jacobian)
    }

    fn controlling_group(&self, link: &str) -> Result<String> {
        self.link_groups
            .get(link)
            .cloned()
            .ok_or_else(|| PostureError::UnknownLink(link.to_string()))
    }

    fn group_joints(&self, group: &str) -> Result<Vec<String>> {
        self.groups
            .get(group)
            .map(|g| g.joints.clone())
            .ok_or_else(|| PostureError::UnknownGroup(group.to_string()))
    }
}
