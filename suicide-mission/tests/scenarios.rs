use suicide_mission::tree::compress_recruits;
use suicide_mission::{Ally, CrewSurvival, Outcome, Scope, Step, Traversal, Walk, replay};

fn idx(ally: Ally) -> u16 {
    u16::from(ally.index().unwrap())
}

fn traversal(choices: &[(Step, u16)]) -> Traversal {
    let mut traversal = Traversal::new();
    for &(step, value) in choices {
        traversal.set(step, value).unwrap();
    }
    traversal
}

/// Everyone recruited and loyal, every upgrade, every specialist ideal.
fn perfect_run() -> Vec<(Step, u16)> {
    vec![
        (Step::Recruitment, compress_recruits(Ally::RECRUITABLE)),
        (Step::Loyalty, Ally::LOYALTY.bits()),
        (Step::Morinth, 0),
        (Step::Armor, 1),
        (Step::Shield, 1),
        (Step::CargoBay, 0),
        (Step::Weapon, 1),
        (Step::Tech, idx(Ally::LEGION)),
        (Step::FirstLeader, 1),
        (Step::Biotic, idx(Ally::SAMARA)),
        (Step::SecondLeader, idx(Ally::MIRANDA)),
        (Step::Rescue, 1),
        (Step::Escort, idx(Ally::KASUMI)),
        (Step::CrewDelay, 1),
        (Step::LongWalk, 0),
        (Step::FinalSquad, (Ally::MORDIN | Ally::TALI).bits()),
    ]
}

fn with(mut choices: Vec<(Step, u16)>, step: Step, value: u16) -> Vec<(Step, u16)> {
    for choice in &mut choices {
        if choice.0 == step {
            choice.1 = value;
        }
    }
    choices
}

#[test]
fn perfect_run_saves_everyone() {
    let outcome = replay(&traversal(&perfect_run())).unwrap();
    let everyone = Ally::EVERYONE - Ally::MORINTH;
    assert_eq!(outcome.spared, everyone);
    assert_eq!(outcome.loyal, Ally::LOYALTY);
    assert_eq!(outcome.crew, CrewSurvival::All);
    assert!(outcome.commander_survives());
    // Every outcome bit is set.
    assert_eq!(outcome.encode().raw(), 0x07FF_FFFF);
}

#[test]
fn skipping_the_armor_costs_jack() {
    let choices = with(perfect_run(), Step::Armor, 0);
    let outcome = replay(&traversal(&choices)).unwrap();
    let expected = Ally::EVERYONE - Ally::MORINTH - Ally::JACK;
    assert_eq!(outcome.spared, expected);
    assert_eq!(outcome.loyal, expected);
    assert_eq!(outcome.crew, CrewSurvival::All);
}

#[test]
fn late_rescue_saves_only_chakwas() {
    let choices = with(perfect_run(), Step::CrewDelay, 3);
    let outcome = replay(&traversal(&choices)).unwrap();
    assert_eq!(outcome.crew, CrewSurvival::ChakwasOnly);
    assert_eq!(outcome.spared, Ally::EVERYONE - Ally::MORINTH);
}

#[test]
fn morinth_replaces_samara_for_good() {
    let choices = with(perfect_run(), Step::Morinth, 1);
    let choices = with(choices, Step::Biotic, idx(Ally::MORINTH));
    let outcome = replay(&traversal(&choices)).unwrap();
    assert_eq!(outcome.spared, Ally::EVERYONE - Ally::SAMARA);
    // Morinth's loyalty is implied and never stored.
    assert_eq!(outcome.loyal, Ally::LOYALTY - Ally::SAMARA);
}

#[test]
fn picking_samara_after_morinth_is_illegal() {
    let choices = with(perfect_run(), Step::Morinth, 1);
    assert!(replay(&traversal(&choices)).is_err());
}

fn doomed_run(squad: Ally) -> Vec<(Step, u16)> {
    vec![
        (
            Step::Recruitment,
            compress_recruits(Ally::GRUNT | Ally::THANE | Ally::ZAEED),
        ),
        (Step::Loyalty, 0),
        (Step::Morinth, 0),
        (Step::Armor, 1),
        (Step::Shield, 1),
        (Step::CargoBay, 0),
        (Step::Weapon, 1),
        (Step::Tech, idx(Ally::MORDIN)),
        (Step::FirstLeader, 0),
        (Step::Biotic, idx(Ally::JACK)),
        (Step::SecondLeader, idx(Ally::GARRUS)),
        (Step::Rescue, 0),
        (Step::Escort, 0),
        (Step::CrewDelay, 0),
        (Step::LongWalk, 1),
        (Step::FinalSquad, squad.bits()),
    ]
}

#[test]
fn disloyal_team_leaves_one_survivor() -> anyhow::Result<()> {
    // Mordin dies in the vents, Thane on the walk, Garrus leading.
    // Grunt and Zaeed fall with the squad; Jack and Miranda at the line.
    let outcome = replay(&traversal(&doomed_run(Ally::GRUNT | Ally::ZAEED)))?;
    assert_eq!(outcome.spared, Ally::JACOB);
    assert_eq!(outcome.loyal, Ally::NOBODY);
    assert_eq!(outcome.crew, CrewSurvival::Lost);
    assert!(!outcome.commander_survives());
    assert_eq!(outcome.encode().raw(), 0x2);
    Ok(())
}

#[test]
fn strong_defenders_hold_the_line() {
    let outcome = replay(&traversal(&doomed_run(Ally::JACK | Ally::JACOB))).unwrap();
    assert_eq!(outcome.spared, Ally::MIRANDA | Ally::GRUNT | Ally::ZAEED);
    assert!(outcome.commander_survives());
}

#[test]
fn doomed_scenario_is_reached_by_the_walk() -> anyhow::Result<()> {
    let target = traversal(&doomed_run(Ally::GRUNT | Ally::ZAEED)).encode();
    let scope = Scope::full()
        .with_recruits(Ally::GRUNT | Ally::THANE | Ally::ZAEED)
        .with_loyalty(Ally::NOBODY)
        .with_upgrades(true, true, true)
        .pin(Step::Tech, idx(Ally::MORDIN));
    let mut found = None;
    for leaf in Walk::new(scope) {
        let leaf = leaf?;
        if leaf.traversal == target {
            found = Some(leaf);
            break;
        }
    }
    let leaf = found.ok_or_else(|| anyhow::anyhow!("scenario traversal is not enumerated"))?;
    assert_eq!(
        Outcome::decode(leaf.outcome),
        Outcome::new(Ally::JACOB, Ally::NOBODY, CrewSurvival::Lost)
    );
    Ok(())
}
