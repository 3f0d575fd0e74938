//! Applies one tick of agent input to the reference world.

use std::f32::consts::TAU;

use super::*;

/// World units per second.
pub const MOVE_SPEED: f32 = 3.0;
pub const AVATAR_RADIUS: f32 = 0.25;
const PICKUP_RADIUS: f32 = 0.6;
const USE_RANGE: f32 = 1.6;
const PASSAGE_OPEN_SECONDS: f32 = 1.0;
/// Half-width of a hostile's hitbox as seen by hitscan.
const HIT_HALF_WIDTH: f32 = 0.45;

struct WeaponStats {
    damage: i32,
    cooldown: f32,
    range: f32,
}

fn weapon_stats(weapon: Weapon) -> WeaponStats {
    match weapon {
        Weapon::Knife => WeaponStats { damage: 10, cooldown: 0.5, range: 1.2 },
        Weapon::Pistol => WeaponStats { damage: 25, cooldown: 0.4, range: f32::INFINITY },
        Weapon::MachineGun => WeaponStats { damage: 20, cooldown: 0.2, range: f32::INFINITY },
        Weapon::Chaingun => WeaponStats { damage: 15, cooldown: 0.15, range: f32::INFINITY },
    }
}

enum Usable {
    Passage(PassageId),
    Control(String),
}

impl SimWorld {
    pub fn apply_input(&mut self, input: &AgentInput, dt: f32) {
        if let Some(weapon) = input.weapon_request
            && self.weapons.contains(&weapon)
        {
            self.equipped = weapon;
        }
        self.avatar.heading = (self.avatar.heading + input.turn).rem_euclid(TAU);
        self.move_avatar(input, dt);
        self.collect_pickups();
        self.visit_triggers();
        if input.interact {
            self.use_nearest();
        }
        self.fire_cooldown = (self.fire_cooldown - dt).max(0.0);
        if input.fire {
            self.fire();
        }
        self.animate_passages(dt);
        self.tick += 1;
    }

    fn move_avatar(&mut self, input: &AgentInput, dt: f32) {
        let forward = Vec2::from_angle(self.avatar.heading);
        let right = forward.perp();
        let mut direction = Vec2::ZERO;
        if input.forward {
            direction += forward;
        }
        if input.back {
            direction -= forward;
        }
        if input.strafe_right {
            direction += right;
        }
        if input.strafe_left {
            direction -= right;
        }
        let Some(direction) = direction.try_normalize() else {
            return;
        };
        let step = direction * MOVE_SPEED * dt;
        let pos = self.avatar.pos;
        let along_x = Vec2::new(pos.x + step.x, pos.y);
        if self.fits(along_x) {
            self.avatar.pos = along_x;
        }
        let pos = self.avatar.pos;
        let along_y = Vec2::new(pos.x, pos.y + step.y);
        if self.fits(along_y) {
            self.avatar.pos = along_y;
        }
    }

    /// Whether the avatar's bounding box at `center` touches only walkable tiles.
    pub fn fits(&self, center: Vec2) -> bool {
        let r = AVATAR_RADIUS;
        [Vec2::new(-r, -r), Vec2::new(r, -r), Vec2::new(-r, r), Vec2::new(r, r)]
            .into_iter()
            .all(|corner| self.is_tile_walkable(Pos::of_point(center + corner)))
    }

    fn collect_pickups(&mut self) {
        let pos = self.avatar.pos;
        let reached: Vec<String> = self
            .pickups
            .iter()
            .filter(|(_, pickup)| !pickup.taken && pickup.pos.distance(pos) <= PICKUP_RADIUS)
            .map(|(id, _)| id.clone())
            .collect();
        for id in reached {
            self.take_pickup(&id);
            if let Some(weapon) = self.pickups.get(&id).and_then(|pickup| pickup.weapon) {
                self.equipped = weapon;
            }
        }
    }

    fn visit_triggers(&mut self) {
        let tile = Pos::of_point(self.avatar.pos);
        if let Some(flag) = self.triggers.get(&tile).cloned() {
            self.set_flag(&flag);
        }
    }

    fn use_nearest(&mut self) {
        let pos = self.avatar.pos;
        let mut best: Option<(f32, Usable)> = None;
        for (id, passage) in &self.passages {
            let distance = passage.center.distance(pos);
            if passage.is_fully_open() || distance > USE_RANGE {
                continue;
            }
            if best.as_ref().is_none_or(|(closest, _)| distance < *closest) {
                best = Some((distance, Usable::Passage(id)));
            }
        }
        for (id, control) in &self.interactables {
            let distance = control.pos.distance(pos);
            if distance > USE_RANGE {
                continue;
            }
            if best.as_ref().is_none_or(|(closest, _)| distance < *closest) {
                best = Some((distance, Usable::Control(id.clone())));
            }
        }

        match best.map(|(_, usable)| usable) {
            Some(Usable::Passage(id)) => {
                let unlocked = !self.passages[id].locked || self.can_unlock(&self.passages[id]);
                let passage = &mut self.passages[id];
                if unlocked {
                    passage.locked = false;
                    passage.opening = true;
                }
            }
            Some(Usable::Control(id)) => {
                let Some(control) = self.interactables.get(&id) else {
                    return;
                };
                if control.requires.is_none_or(|weapon| weapon == self.equipped) {
                    let flag = control.flag.clone();
                    self.set_flag(&flag);
                }
            }
            None => {}
        }
    }

    fn fire(&mut self) {
        if self.fire_cooldown > 0.0 {
            return;
        }
        let stats = weapon_stats(self.equipped);
        self.fire_cooldown = stats.cooldown;

        let origin = self.avatar.pos;
        let aim = Vec2::from_angle(self.avatar.heading);
        let mut hit: Option<(f32, EntityId)> = None;
        for (id, hostile) in &self.hostiles {
            if hostile.hp <= 0 {
                continue;
            }
            let offset = hostile.pos - origin;
            let distance = offset.length();
            if distance > stats.range || distance < f32::EPSILON {
                continue;
            }
            let error = aim.angle_between(offset);
            if error > HIT_HALF_WIDTH.atan2(distance) || !self.has_line_of_sight(origin, hostile.pos) {
                continue;
            }
            if hit.is_none_or(|(closest, _)| distance < closest) {
                hit = Some((distance, id));
            }
        }
        if let Some((_, id)) = hit {
            self.hostiles[id].hp -= stats.damage;
        }
    }

    fn animate_passages(&mut self, dt: f32) {
        for passage in self.passages.values_mut() {
            if !passage.opening {
                continue;
            }
            passage.progress = (passage.progress + dt / PASSAGE_OPEN_SECONDS).min(1.0);
            if passage.is_fully_open() {
                passage.opening = false;
                passage.open = true;
            }
        }
    }
}
