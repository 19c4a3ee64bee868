use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use relq::queue::slist::{SlistEntry, SlistHead, SlistLink};
use relq::RelIdx;

struct Node {
    link: SlistLink,
}

enum ByLink {}
impl SlistEntry<Node> for ByLink {
    fn link(elm: &Node) -> &SlistLink {
        &elm.link
    }
    fn link_mut(elm: &mut Node) -> &mut SlistLink {
        &mut elm.link
    }
}

type Head = SlistHead<Node, ByLink>;

fn arena(n: usize) -> Vec<Node> {
    (0..n)
        .map(|_| Node {
            link: SlistLink::new(),
        })
        .collect()
}

fn extract(h: &Head, base: &[Node]) -> Vec<u32> {
    h.iter(base).map(|i| i.raw()).collect()
}

fn check(h: &Head, base: &[Node], model: &[u32]) {
    assert_eq!(extract(h, base), model);
    assert_eq!(h.is_empty(), model.is_empty());
    assert_eq!(h.first().raw(), model.first().copied().unwrap_or(0));
}

#[test]
fn randomized_against_model() {
    const CAP: usize = 512;
    const OPS: usize = 40_000;

    let mut rng = StdRng::seed_from_u64(0x5115_7001);
    let mut base = arena(CAP);
    let mut h = Head::new();
    let mut model: Vec<u32> = Vec::new();
    let mut free: Vec<u32> = (1..=CAP as u32).collect();

    for op in 0..OPS {
        match rng.gen_range(0, 5) {
            // insert_head
            0 => {
                if let Some(idx) = free.pop() {
                    h.insert_head(&mut base, RelIdx::new(idx));
                    model.insert(0, idx);
                }
            }
            // insert_after a random member
            1 => {
                if !model.is_empty() && !free.is_empty() {
                    let at = model[rng.gen_range(0, model.len())];
                    let idx = free.pop().unwrap();
                    Head::insert_after(&mut base, RelIdx::new(at), RelIdx::new(idx));
                    let pos = model.iter().position(|&x| x == at).unwrap();
                    model.insert(pos + 1, idx);
                }
            }
            // remove_head
            2 => {
                let removed = h.remove_head(&mut base);
                if !model.is_empty() {
                    assert_eq!(removed.raw(), model.remove(0));
                    free.push(removed.raw());
                } else {
                    assert!(removed.is_nil());
                }
            }
            // remove_after a random member
            3 => {
                if !model.is_empty() {
                    let pos = rng.gen_range(0, model.len());
                    let at = model[pos];
                    let removed = Head::remove_after(&mut base, RelIdx::new(at));
                    if pos + 1 < model.len() {
                        assert_eq!(removed.raw(), model.remove(pos + 1));
                        free.push(removed.raw());
                    } else {
                        assert!(removed.is_nil());
                    }
                }
            }
            // remove an arbitrary member (O(n) walk)
            _ => {
                if !model.is_empty() {
                    let pos = rng.gen_range(0, model.len());
                    let idx = model.remove(pos);
                    h.remove(&mut base, RelIdx::new(idx));
                    free.push(idx);
                    assert!(base[(idx - 1) as usize].link.next().is_nil());
                }
            }
        }

        if op % 32 == 0 {
            check(&h, &base, &model);
        }
    }
    check(&h, &base, &model);
}

#[test]
fn safe_iteration_matches_model_filter() {
    const CAP: usize = 256;
    let mut rng = StdRng::seed_from_u64(0x5115_7002);
    let mut base = arena(CAP);
    let mut h = Head::new();
    let mut model: Vec<u32> = Vec::new();
    for idx in (1..=CAP as u32).rev() {
        h.insert_head(&mut base, RelIdx::new(idx));
        model.insert(0, idx);
    }
    model.sort_unstable();

    let keep: Vec<bool> = (0..=CAP).map(|_| rng.gen::<bool>()).collect();
    let mut cur = h.cursor();
    while let Some(idx) = cur.next(&base) {
        if !keep[idx.raw() as usize] {
            h.remove(&mut base, idx);
        }
    }
    let expect: Vec<u32> = model
        .iter()
        .copied()
        .filter(|&i| keep[i as usize])
        .collect();
    check(&h, &base, &expect);
}
