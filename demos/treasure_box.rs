//! Treasure Box: a tiny terminal game driven by non-blocking stdin reads.
//!
//! The game loop ticks twice a second whether or not a key was pressed; a
//! monster wanders on its own clock. Each tick polls stdin with
//! `nonblock_read` for at most one key, so input never stalls the loop.
//!
//! Controls: w/a/s/d move, p pokes for treasure, c checks the compass,
//! t tells the position, h shows help, q quits.

use crossterm::{cursor, execute, terminal};
use nonblock::{nonblock_read, FdReader, RawModeGuard};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::time::{Duration, Instant};

const WALL_EAST: i32 = 25;
const WALL_NORTH: i32 = 15;
const VERY_CLOSE: i32 = 6;
const TICK: Duration = Duration::from_millis(500);
const MONSTER_EVERY: Duration = Duration::from_secs(2);

const HELP: &str = "Controls:

  Movement:
\tw = move north
\ta = move west
\ts = move south
\td = move east

  Other:
\tt = Tell current position
\tp = Poke for treasure
\tc = Check Compass
\th = Show help
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pos {
    x: i32,
    y: i32,
}

enum Outcome {
    Playing,
    Found,
    Exhausted,
    Eaten,
    Quit,
}

struct Game {
    me: Pos,
    monster: Pos,
    treasure: Pos,
    poked: Vec<Pos>,
    tries: i32,
    compass: i32,
    last_msg: String,
}

impl Game {
    fn new() -> Self {
        let me = Pos { x: 7, y: 7 };
        let mut treasure = me;
        while treasure == me {
            treasure = Pos {
                x: fastrand::i32(0..=WALL_EAST),
                y: fastrand::i32(0..=WALL_NORTH),
            };
        }
        Self {
            me,
            monster: Pos { x: 3, y: 9 },
            treasure,
            poked: Vec::new(),
            tries: 5,
            compass: 9,
            last_msg: String::new(),
        }
    }

    fn step(&mut self, dx: i32, dy: i32, dir: &str) {
        self.last_msg = format!("You take a step {dir}.\n");
        let x = (self.me.x + dx).clamp(0, WALL_EAST);
        let y = (self.me.y + dy).clamp(0, WALL_NORTH);
        if (x, y) == (self.me.x, self.me.y) {
            self.last_msg.push_str(&format!("You hit the {dir} wall!\n\n"));
        }
        self.me = Pos { x, y };
    }

    fn wander(&mut self) {
        let (move_x, move_y) = match fastrand::u8(0..=10) {
            0..=3 => (true, false),
            4..=6 => (false, true),
            _ => (true, true),
        };
        if move_x {
            let dx = if fastrand::bool() { -1 } else { 1 };
            self.monster.x = (self.monster.x + dx).clamp(0, WALL_EAST);
        }
        if move_y {
            let dy = if fastrand::bool() { -1 } else { 1 };
            self.monster.y = (self.monster.y + dy).clamp(0, WALL_NORTH);
        }
    }

    fn compass_hint(&self) -> String {
        let mut hint = String::new();
        if (self.me.x - self.treasure.x).abs() <= VERY_CLOSE {
            hint.push_str("You feel very close in respect to east-west..\n\n");
        } else if self.me.x > self.treasure.x {
            hint.push_str("You can feel the treasure far to the west..\n\n");
        } else {
            hint.push_str("You can feel the treasure far to the east..\n\n");
        }
        if (self.me.y - self.treasure.y).abs() <= VERY_CLOSE {
            hint.push_str("You feel very close in respect to north-south..\n\n");
        } else if self.me.y > self.treasure.y {
            hint.push_str("You can feel the treasure far to the south..\n\n");
        } else {
            hint.push_str("You can feel the treasure far to the north..\n\n");
        }
        hint
    }

    fn handle(&mut self, key: char) -> Outcome {
        match key {
            'q' => return Outcome::Quit,
            'w' => self.step(0, 1, "north"),
            's' => self.step(0, -1, "south"),
            'a' => self.step(-1, 0, "west"),
            'd' => self.step(1, 0, "east"),
            't' => self.last_msg = format!("You are at: (x={}, y={})\n\n", self.me.x, self.me.y),
            'h' => self.last_msg = HELP.to_string(),
            'p' => {
                if self.me == self.treasure {
                    self.last_msg = "You found the treasure!\n\n".into();
                    return Outcome::Found;
                }
                self.tries -= 1;
                if self.tries < 0 {
                    self.last_msg = "\n**** You die of exhaustion. ****\n\n".into();
                    return Outcome::Exhausted;
                }
                self.poked.push(self.me);
                self.last_msg = "You poke around for treasure...\n\nYou find nothing.\n\n".into();
            }
            'c' => {
                if self.compass <= 0 {
                    self.last_msg = "Your compass seems used up..\n\n".into();
                } else {
                    self.compass -= 1;
                    self.last_msg = self.compass_hint();
                }
            }
            _ => {}
        }
        Outcome::Playing
    }

    fn draw(&self, out: &mut impl Write) -> io::Result<()> {
        execute!(
            out,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        writeln!(out, "WELCOME TO THE BOX! (h = help)\n")?;
        let border = "=".repeat((WALL_EAST + 2) as usize);
        writeln!(out, "{border}")?;
        for y in (0..=WALL_NORTH).rev() {
            let row: String = (0..=WALL_EAST)
                .map(|x| {
                    let here = Pos { x, y };
                    if here == self.monster {
                        '@'
                    } else if here == self.me {
                        '*'
                    } else if self.poked.contains(&here) {
                        'X'
                    } else {
                        ' '
                    }
                })
                .collect();
            writeln!(out, "|{row}|")?;
        }
        writeln!(out, "{border}")?;
        writeln!(
            out,
            "Pokes(p): {}\tCompass(c): {}\nPos: ({}, {})\n{}\n",
            self.tries,
            self.compass,
            self.me.x,
            self.me.y,
            "-".repeat(20)
        )?;
        writeln!(out, "\n{}", self.last_msg)?;
        out.flush()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Read the raw descriptor; std's Stdin buffers behind our back.
    let stdin = File::from(io::stdin().as_fd().try_clone_to_owned()?);
    let mut keys = FdReader::new(stdin).with_mode("t");

    let mut game = Game::new();
    game.last_msg = format!("You have entered THE BOX!\n{HELP}");

    let mut guard = RawModeGuard::acquire()?;
    let mut last_tick = Instant::now();
    let mut monster_clock = Duration::ZERO;

    let outcome = loop {
        guard.suspend(|| game.draw(&mut io::stdout()))??;

        std::thread::sleep(TICK.saturating_sub(last_tick.elapsed()));
        last_tick = Instant::now();

        monster_clock += TICK;
        if monster_clock >= MONSTER_EVERY {
            monster_clock = Duration::ZERO;
            game.wander();
        }
        if game.monster == game.me {
            game.tries = 0;
            break Outcome::Eaten;
        }

        let Some(data) = nonblock_read(&mut keys, Some(1), None)?.into_data()
        else {
            break Outcome::Quit;
        };
        let key = data.as_text().and_then(|text| text.chars().next());
        if let Some(key) = key {
            match game.handle(key) {
                Outcome::Playing => {}
                done => break done,
            }
        }
    };
    drop(guard);

    match outcome {
        Outcome::Found => {
            let points = game.tries * game.compass;
            println!(
                "You found the treasure! You win with {points} points! ({} tries * {} remaining compass)",
                game.tries, game.compass
            );
        }
        Outcome::Eaten => println!("YOU WERE EATEN BY THE MONSTER!\nYou lose! GAME OVER!"),
        Outcome::Exhausted => println!("{}You lose! GAME OVER!", game.last_msg),
        Outcome::Quit | Outcome::Playing => println!("You lose! GAME OVER!"),
    }
    Ok(())
}
